use crate::{
    config::{ApiConfig, TlsVerification},
    error::{ProbeError, Result},
};
use rustls::crypto::ring;
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::certs;
use std::{fs::File, io::BufReader, path::Path, sync::Arc};
use tracing::{debug, warn};

/// Client TLS settings for the API session. `None` means certificate
/// verification is off and the caller should accept any certificate.
pub fn client_config(api: &ApiConfig) -> Result<Option<ClientConfig>> {
    let roots = match &api.verification {
        TlsVerification::Disabled => return Ok(None),
        TlsVerification::PlatformRoots => platform_roots()?,
        TlsVerification::CaBundle(path) => bundle_roots(path)?,
    };

    let builder = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|err| ProbeError::Config(format!("unusable TLS protocol set: {err}")))?;

    let config = match api.host_header.as_deref() {
        #[cfg(feature = "host-header-tls")]
        Some(header) => {
            let provider = Arc::clone(builder.crypto_provider());
            let verifier = host_header::verifier(header, roots, provider)?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(verifier)
                .with_no_client_auth()
        }
        #[cfg(not(feature = "host-header-tls"))]
        Some(header) => {
            debug!(
                host_header = header,
                "host-header certificate checks not compiled in, \
                 verifying against the connection host"
            );
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        None => builder.with_root_certificates(roots).with_no_client_auth(),
    };

    Ok(Some(config))
}

fn bundle_roots(path: &Path) -> Result<RootCertStore> {
    let display = path.display();
    let file = File::open(path)
        .map_err(|err| ProbeError::Config(format!("failed to open API_CA '{display}': {err}")))?;
    let mut reader = BufReader::new(file);

    let mut roots = RootCertStore::empty();
    for cert in certs(&mut reader) {
        let cert = cert.map_err(|err| {
            ProbeError::Config(format!("failed to parse API_CA '{display}': {err}"))
        })?;
        roots
            .add(cert)
            .map_err(|err| ProbeError::Config(format!("invalid certificate in API_CA: {err}")))?;
    }

    if roots.is_empty() {
        return Err(ProbeError::Config(format!(
            "API_CA '{display}' contained no certificates"
        )));
    }
    Ok(roots)
}

fn platform_roots() -> Result<RootCertStore> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        warn!(error = %err, "skipping unreadable platform certificate source");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!(added, ignored, "loaded platform trust roots");

    if roots.is_empty() {
        return Err(ProbeError::Config(
            "no platform trust roots available; set API_CA".into(),
        ));
    }
    Ok(roots)
}

/// Name the certificate is checked against when a virtual-host header is
/// configured: the header minus any `:port` suffix.
pub fn host_header_name(header: &str) -> &str {
    let header = header.trim();
    match header.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':')
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => header,
    }
}

#[cfg(feature = "host-header-tls")]
mod host_header {
    use super::host_header_name;
    use crate::error::{ProbeError, Result};
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::client::WebPkiServerVerifier;
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
    use std::sync::Arc;

    /// Standard WebPKI checks, but against the virtual host instead of the
    /// name the connection was opened with.
    #[derive(Debug)]
    struct HostHeaderVerifier {
        inner: Arc<WebPkiServerVerifier>,
        name: ServerName<'static>,
    }

    pub(super) fn verifier(
        header: &str,
        roots: RootCertStore,
        provider: Arc<CryptoProvider>,
    ) -> Result<Arc<dyn ServerCertVerifier>> {
        let name = ServerName::try_from(host_header_name(header).to_string()).map_err(|err| {
            ProbeError::Config(format!(
                "API_HOST_HEADER '{header}' is not a valid server name: {err}"
            ))
        })?;
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|err| {
                ProbeError::Config(format!("failed to build certificate verifier: {err}"))
            })?;

        Ok(Arc::new(HostHeaderVerifier { inner, name }))
    }

    impl ServerCertVerifier for HostHeaderVerifier {
        fn verify_server_cert(
            &self,
            end_entity: &CertificateDer<'_>,
            intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            ocsp_response: &[u8],
            now: UnixTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            self.inner
                .verify_server_cert(end_entity, intermediates, &self.name, ocsp_response, now)
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            self.inner.verify_tls12_signature(message, cert, dss)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            self.inner.verify_tls13_signature(message, cert, dss)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.inner.supported_verify_schemes()
        }
    }
}
