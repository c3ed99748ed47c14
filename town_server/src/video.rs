use futures_util::future::BoxFuture;
use uuid::Uuid;

/// Issues the opaque credential a client uses to reach the video service.
/// A failed fetch still admits the player, just without video.
pub trait VideoTokenProvider: Send + Sync {
    fn token_for<'a>(&'a self, town_id: &'a str, user_name: &'a str) -> BoxFuture<'a, Result<String, String>>;
}

/// Mints random local tokens. Stands in for a hosted video provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalVideoTokenProvider;

impl VideoTokenProvider for LocalVideoTokenProvider {
    fn token_for<'a>(&'a self, town_id: &'a str, user_name: &'a str) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let token = Uuid::new_v4().simple().to_string();
            tracing::debug!(town = town_id, user = user_name, "video token issued");
            Ok::<_, String>(token)
        })
    }
}

/// Video turned off in config: every fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledVideoProvider;

impl VideoTokenProvider for DisabledVideoProvider {
    fn token_for<'a>(&'a self, _town_id: &'a str, _user_name: &'a str) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async { Err::<String, _>("video disabled".to_string()) })
    }
}
