use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,sqlx::query=warn";

/// Installs the process-wide subscriber. Output is JSON lines for log
/// shippers; `PS_LOG_FORMAT=text` switches to a plain stream for local
/// debugging. `RUST_LOG` overrides the default directives.
pub fn init(service_name: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    if text_format_requested(std::env::var("PS_LOG_FORMAT").ok().as_deref()) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    }

    tracing::info!(
        service = service_name,
        pid = std::process::id(),
        "logging ready"
    );
}

fn text_format_requested(format: Option<&str>) -> bool {
    matches!(format.map(str::trim), Some(value) if value.eq_ignore_ascii_case("text"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_the_default_format() {
        assert!(!text_format_requested(None));
        assert!(!text_format_requested(Some("")));
        assert!(!text_format_requested(Some("json")));
    }

    #[test]
    fn text_format_matches_case_insensitively() {
        assert!(text_format_requested(Some("text")));
        assert!(text_format_requested(Some(" TEXT ")));
        assert!(!text_format_requested(Some("texty")));
    }
}
