//! Table monitor endpoint resolution.

use crate::catalog::MonitorCatalog;
use crate::error::{Error, Result};
use reqwest::Url;
use tracing::info;

/// System property holding the table monitor publisher port.
pub const MONITOR_PORT_PROPERTY: &str = "conf.set_monitor_port";

/// Property value reported when table monitor support is turned off.
pub const MONITOR_DISABLED: &str = "-1";

/// Validate `table_name` and discover the pub/sub address its monitor
/// publishes on.
///
/// Fails with a configuration error when the table is a collection or the
/// port is malformed, and with [`Error::MonitorUnsupported`] when the server
/// has table monitors disabled. Only metadata queries are issued.
pub async fn resolve_monitor_endpoint<C>(catalog: &C, url: &Url, table_name: &str) -> Result<String>
where
    C: MonitorCatalog + ?Sized,
{
    let table = catalog.show_table(table_name).await?;
    if table.is_collection() {
        return Err(Error::InvalidConfig(format!(
            "Cannot create connector for collection {table_name}."
        )));
    }

    let port_value = catalog.show_system_property(MONITOR_PORT_PROPERTY).await?;
    let port = parse_monitor_port(port_value.as_deref())?;

    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidConfig(format!("Invalid URL ({url}).")))?;
    let endpoint = format!("tcp://{host}:{port}");

    info!("Resolved table monitor endpoint for {table_name}: {endpoint}");
    Ok(endpoint)
}

/// Interpret the monitor port property.
pub fn parse_monitor_port(value: Option<&str>) -> Result<u16> {
    let value = match value {
        None | Some(MONITOR_DISABLED) => {
            return Err(Error::MonitorUnsupported(
                "Table monitor not supported.".to_string(),
            ))
        }
        Some(value) => value,
    };

    match value.parse::<i64>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port as u16),
        _ => Err(Error::InvalidConfig(format!(
            "Invalid table monitor port ({value})."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ports() {
        assert_eq!(parse_monitor_port(Some("1")).unwrap(), 1);
        assert_eq!(parse_monitor_port(Some("9002")).unwrap(), 9002);
        assert_eq!(parse_monitor_port(Some("65535")).unwrap(), 65535);
    }

    #[test]
    fn test_absent_or_disabled_is_unsupported() {
        assert!(matches!(
            parse_monitor_port(None),
            Err(Error::MonitorUnsupported(_))
        ));
        assert!(matches!(
            parse_monitor_port(Some("-1")),
            Err(Error::MonitorUnsupported(_))
        ));
    }

    #[test]
    fn test_bad_ports_are_config_errors() {
        for bad in ["0", "65536", "-2", "abc", "", " 9002", "90.2", "99999999999999999999"] {
            let err = parse_monitor_port(Some(bad)).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "{bad}: {err}");
        }
    }
}
