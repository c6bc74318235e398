use sentry_tracing::SentryLayer;
use tracing_subscriber::registry::LookupSpan;

/// Initialise error reporting when a DSN is configured. The returned guard
/// must be held for the lifetime of the process to flush pending events.
pub fn init_once(dsn: Option<&str>) -> Option<sentry::ClientInitGuard> {
    let dsn = dsn.map(str::trim).filter(|dsn| !dsn.is_empty())?;
    let dsn = match dsn.parse::<sentry::types::Dsn>() {
        Ok(dsn) => dsn,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid SENTRY_DSN");
            return None;
        }
    };

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    tracing::info!("Sentry error reporting enabled");
    Some(guard)
}

/// Forwards `error!` events to Sentry and keeps lower levels as breadcrumbs.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer()
}
