//! TLS settings inspection.
//!
//! Listeners accept a TLS flag and certificate path for configuration
//! compatibility, but always serve plaintext. The settings are checked and
//! reported at startup so a misconfiguration is visible in the logs.

use std::path::{Path, PathBuf};

use crate::config::ListenerConfig;
use crate::protocol::ProtocolVersion;

/// Outcome of checking one listener's TLS settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsCheck {
    Disabled,
    /// Enabled without a certificate path.
    NoCertificate,
    /// Enabled, certificate file present.
    Certificate(PathBuf),
    /// Enabled, certificate path does not point at a file.
    MissingCertificate(PathBuf),
}

impl TlsCheck {
    pub fn inspect(config: &ListenerConfig) -> Self {
        if !config.tls_enabled {
            return TlsCheck::Disabled;
        }
        match config.tls_cert_path.as_deref() {
            None => TlsCheck::NoCertificate,
            Some(path) if is_file(path) => TlsCheck::Certificate(path.to_path_buf()),
            Some(path) => TlsCheck::MissingCertificate(path.to_path_buf()),
        }
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

/// Inspect and log the TLS settings of a listener.
pub fn report(version: ProtocolVersion, config: &ListenerConfig) -> TlsCheck {
    let check = TlsCheck::inspect(config);
    match &check {
        TlsCheck::Disabled => {}
        TlsCheck::NoCertificate => tracing::warn!(
            %version,
            "TLS enabled without a certificate file; serving plaintext"
        ),
        TlsCheck::Certificate(path) => tracing::info!(
            %version,
            cert_file = %path.display(),
            "TLS configured; certificates are not loaded, serving plaintext"
        ),
        TlsCheck::MissingCertificate(path) => tracing::warn!(
            %version,
            cert_file = %path.display(),
            "TLS certificate file not found; serving plaintext"
        ),
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn listener(tls_enabled: bool, cert: Option<PathBuf>) -> ListenerConfig {
        ListenerConfig {
            tls_enabled,
            tls_cert_path: cert,
            ..ListenerConfig::defaults_for(ProtocolVersion::V3)
        }
    }

    #[test]
    fn disabled_ignores_path() {
        let config = listener(false, Some(PathBuf::from("/nope.pem")));
        assert_eq!(TlsCheck::inspect(&config), TlsCheck::Disabled);
    }

    #[test]
    fn missing_certificate_is_reported() {
        let config = listener(true, Some(PathBuf::from("/definitely/not/here.pem")));
        assert!(matches!(
            report(ProtocolVersion::V3, &config),
            TlsCheck::MissingCertificate(_)
        ));
        assert_eq!(TlsCheck::inspect(&listener(true, None)), TlsCheck::NoCertificate);
    }

    #[test]
    fn present_certificate_is_accepted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        let config = listener(true, Some(file.path().to_path_buf()));
        assert_eq!(
            TlsCheck::inspect(&config),
            TlsCheck::Certificate(file.path().to_path_buf())
        );
    }
}
