use async_trait::async_trait;

/// Outbound channel for verification messages (SMS gateway, mailer, ...).
///
/// Dispatch is fire-and-forget from the caller's point of view: a stored
/// code stays valid even when the send fails, so implementations should
/// only report errors they want logged.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, identifier: &str, message: &str) -> anyhow::Result<()>;
}

/// Development stand-in that routes messages to the service log instead of
/// a real gateway. The log line contains the plaintext code, so this must
/// never back a production deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, identifier: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!(%identifier, %message, "dev notifier: message not sent anywhere");
        Ok(())
    }
}

/// Message body handed to the notifier when a code is issued.
pub(crate) fn code_message(code: &str, ttl_minutes: i64) -> String {
    format!("Your EventHive verification code is {code}. It expires in {ttl_minutes} minutes.")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_the_code_and_ttl() {
        let message = code_message("042137", 5);
        assert!(message.contains("042137"));
        assert!(message.contains("5 minutes"));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send("+15550001111", "hello").await.is_ok());
    }
}
