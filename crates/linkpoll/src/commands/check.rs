//! `linkpoll check`: validate configuration and print what would be polled.

use std::io::{self, Write};

use linkpoll_core::PollerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load(global)?;
    let mut out = io::stdout().lock();
    write_summary(&mut out, &config)?;
    Ok(())
}

fn write_summary(out: &mut impl Write, config: &PollerConfig) -> io::Result<()> {
    writeln!(out, "interval: {}", humantime::format_duration(config.interval))?;
    writeln!(out, "codec: {:?}", config.codec)?;
    if let Some(ref target) = config.target {
        writeln!(out, "target: {target}")?;
    }
    writeln!(
        out,
        "metadata: {}",
        config.metadata_target.as_deref().unwrap_or("(disabled)")
    )?;
    writeln!(out, "endpoints:")?;

    let width = config
        .endpoints
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(0);
    for endpoint in &config.endpoints {
        let request = &endpoint.request;
        let auth = if request.options.auth.is_some() {
            " (auth)"
        } else {
            ""
        };
        writeln!(
            out,
            "  {:<width$}  {} {}{auth}",
            endpoint.name, request.method, request.url
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use linkpoll_api::RequestSpec;
    use linkpoll_core::NamedEndpoint;
    use url::Url;

    use super::*;

    #[test]
    fn summary_lists_endpoints_aligned() {
        let config = PollerConfig {
            endpoints: vec![
                NamedEndpoint::new(
                    "clients",
                    RequestSpec::get(Url::parse("http://host/api/clients").unwrap()),
                ),
                NamedEndpoint::new(
                    "b",
                    RequestSpec::get(Url::parse("http://other/api").unwrap()),
                ),
            ],
            interval: Duration::from_secs(90),
            metadata_target: None,
            ..PollerConfig::default()
        };

        let mut buf = Vec::new();
        write_summary(&mut buf, &config).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("interval: 1m 30s\n"), "{text}");
        assert!(text.contains("metadata: (disabled)\n"), "{text}");
        assert!(text.contains("  clients  GET http://host/api/clients\n"), "{text}");
        assert!(text.contains("  b        GET http://other/api\n"), "{text}");
    }
}
