//! Default TOML config template with inline documentation comments.

pub(crate) fn default_config_toml() -> &'static str {
    r##"# kbqa Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# base_url = "http://127.0.0.1:8000"   # overridden by KBQA_SERVER_URL
# api_prefix = "/api"
# connect_timeout_secs = 10            # 1-600
# request_timeout_secs = 30            # 1-600, not applied to answer streams

[polling]
# interval_secs = 3                    # 1-3600, document status refresh period

[notifications]
# capacity = 16                        # 1-256

[logging]
# level = "info"                       # trace, debug, info, warn, error
"##
}
