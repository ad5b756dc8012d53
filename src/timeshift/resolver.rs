//! Identity resolution
//!
//! Reconciles the provider-visible stream id used by clients with the
//! host's internal channel records. Provider ids are tried first, internal
//! ids second. Eligibility is decided by the channel's first-priority stream
//! only.

use tracing::warn;

use super::diagnostics::Diagnostics;
use crate::errors::{TimeshiftError, TimeshiftResult};
use crate::models::catchup::IdNamespace;
use crate::models::{AccountType, Channel, Stream, StreamIdentity, User};
use crate::repositories::{ChannelCatalog, UserRepository};

/// Retention assumed when the provider does not report one
pub const DEFAULT_ARCHIVE_RETENTION_DAYS: i64 = 7;

/// Authenticate a client against the XC password stored on the user
pub async fn authenticate(
    users: &dyn UserRepository,
    username: &str,
    password: &str,
) -> TimeshiftResult<User> {
    let Some(user) = users.find_by_username(username).await? else {
        warn!("Auth failed: user '{}' does not exist", username);
        return Err(TimeshiftError::auth_failed(username));
    };

    match user.custom_properties.xc_password.as_deref() {
        None | Some("") => {
            warn!("Auth failed: user '{}' has no xc_password configured", username);
            Err(TimeshiftError::auth_failed(username))
        }
        Some(expected) if expected != password => {
            warn!("Auth failed: wrong password for user '{}'", username);
            Err(TimeshiftError::auth_failed(username))
        }
        Some(_) => Ok(user),
    }
}

/// Find the channel whose XC stream carries `provider_id`
///
/// Streams are scanned in catalog order; the first one attached to a
/// channel wins.
pub async fn find_channel_by_provider_id(
    catalog: &dyn ChannelCatalog,
    provider_id: &str,
) -> TimeshiftResult<Option<(Channel, Stream)>> {
    let Ok(id) = provider_id.trim().parse::<i64>() else {
        return Ok(None);
    };
    for stream in catalog
        .find_streams_by_provider_id(id, Some(AccountType::Xc))
        .await?
    {
        if let Some(channel) = catalog.channels_for_stream(stream.id).await?.into_iter().next() {
            return Ok(Some((channel, stream)));
        }
    }
    Ok(None)
}

/// Find a channel by internal id
pub async fn find_channel_by_internal_id(
    catalog: &dyn ChannelCatalog,
    internal_id: &str,
) -> TimeshiftResult<Option<Channel>> {
    match internal_id.trim().parse::<i64>() {
        Ok(id) => Ok(catalog.get_channel(id).await?),
        Err(_) => Ok(None),
    }
}

/// Resolve `provider_stream_id` to an eligible [`StreamIdentity`] for `user`
pub async fn resolve_identity(
    catalog: &dyn ChannelCatalog,
    user: &User,
    provider_stream_id: &str,
    diagnostics: &Diagnostics,
) -> TimeshiftResult<StreamIdentity> {
    diagnostics.step(
        "lookup",
        format!("provider id {provider_stream_id} among XC streams"),
    );
    let (channel, matched_by) =
        match find_channel_by_provider_id(catalog, provider_stream_id).await? {
            Some((channel, _)) => (channel, IdNamespace::Provider),
            None => {
                diagnostics.step(
                    "lookup",
                    format!("no XC stream, trying internal channel id {provider_stream_id}"),
                );
                match find_channel_by_internal_id(catalog, provider_stream_id).await? {
                    Some(channel) => (channel, IdNamespace::Internal),
                    None => {
                        if diagnostics.is_verbose() {
                            log_not_found_details(catalog, provider_stream_id, diagnostics).await?;
                        }
                        return Err(TimeshiftError::not_found(provider_stream_id));
                    }
                }
            }
        };
    diagnostics.step(
        "lookup",
        format!(
            "matched channel '{}' (id {}) by {} id",
            channel.name, channel.id, matched_by
        ),
    );

    let Some(stream) = catalog.ordered_streams(&channel).await?.into_iter().next() else {
        diagnostics.step("eligibility", format!("channel '{}' has no streams", channel.name));
        return Err(TimeshiftError::not_found(provider_stream_id));
    };

    let account = catalog.get_account(stream.m3u_account_id).await?;
    let account = match account {
        Some(account) if account.account_type == AccountType::Xc => account,
        other => {
            let account_type = other
                .map(|a| a.account_type.to_string())
                .unwrap_or_else(|| "missing".to_string());
            return Err(TimeshiftError::WrongAccountType {
                channel: channel.name.clone(),
                account_type,
            });
        }
    };

    let props = &stream.custom_properties;
    if !props.tv_archive {
        return Err(TimeshiftError::ArchiveUnsupported {
            channel: channel.name.clone(),
        });
    }

    if !user.can_access(&channel) {
        return Err(TimeshiftError::AccessDenied {
            username: user.username.clone(),
            channel: channel.name.clone(),
            user_level: user.user_level,
            required_level: channel.user_level,
        });
    }

    let provider_id = props
        .stream_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| provider_stream_id.to_string());
    let archive_retention_days = props
        .tv_archive_duration
        .unwrap_or(DEFAULT_ARCHIVE_RETENTION_DAYS);

    diagnostics.step(
        "eligibility",
        format!(
            "first stream {} on account {} (provider id {}, archive {} days)",
            stream.id, account.id, provider_id, archive_retention_days
        ),
    );

    Ok(StreamIdentity {
        internal_id: channel.id,
        provider_id,
        archive_enabled: true,
        archive_retention_days,
        matched_by,
        channel,
        stream,
        account,
    })
}

async fn log_not_found_details(
    catalog: &dyn ChannelCatalog,
    provider_stream_id: &str,
    diagnostics: &Diagnostics,
) -> TimeshiftResult<()> {
    let xc_total = catalog
        .count_streams_by_account_type(AccountType::Xc)
        .await?;
    let any_type = match provider_stream_id.trim().parse::<i64>() {
        Ok(id) => catalog.find_streams_by_provider_id(id, None).await?.len(),
        Err(_) => 0,
    };
    diagnostics.step(
        "lookup",
        format!(
            "id {provider_stream_id} not found: {xc_total} XC streams in catalog, \
             {any_type} streams with this provider id under any account type"
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{CatalogSnapshot, InMemoryCatalog};
    use serde_json::json;

    fn catalog() -> InMemoryCatalog {
        let snapshot: CatalogSnapshot = serde_json::from_value(json!({
            "accounts": [
                {"id": 1, "name": "xc", "account_type": "XC", "server_url": "http://xc.example"},
                {"id": 2, "name": "m3u", "account_type": "STD", "server_url": "http://m3u.example"}
            ],
            "streams": [
                {"id": 10, "name": "BBC XC", "m3u_account_id": 1,
                 "custom_properties": {"stream_id": "22371", "tv_archive": 1, "tv_archive_duration": "3"}},
                {"id": 11, "name": "CNN STD", "m3u_account_id": 2,
                 "custom_properties": {"stream_id": 500, "tv_archive": 1}},
                {"id": 12, "name": "CNN XC", "m3u_account_id": 1,
                 "custom_properties": {"stream_id": 501, "tv_archive": 1}},
                {"id": 13, "name": "ITV XC", "m3u_account_id": 1,
                 "custom_properties": {"stream_id": 600, "tv_archive": 0}},
                {"id": 14, "name": "Sky XC", "m3u_account_id": 1,
                 "custom_properties": {"stream_id": 700, "tv_archive": "1"}},
                {"id": 15, "name": "Orphan XC", "m3u_account_id": 1,
                 "custom_properties": {"stream_id": 800, "tv_archive": 1}}
            ],
            "channels": [
                {"id": 100, "name": "BBC One", "streams": [10]},
                {"id": 101, "name": "CNN", "streams": [11, 12]},
                {"id": 102, "name": "ITV", "streams": [13]},
                {"id": 103, "name": "Sky", "user_level": 5, "streams": [14]},
                {"id": 501, "name": "Internal 501", "streams": [10]}
            ]
        }))
        .unwrap();
        InMemoryCatalog::new(snapshot)
    }

    fn user(level: i32) -> User {
        serde_json::from_value(json!({
            "id": 1, "username": "john", "user_level": level,
            "custom_properties": {"xc_password": "secret123"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolves_by_provider_id() {
        let identity = resolve_identity(&catalog(), &user(1), "22371", &Diagnostics::default())
            .await
            .unwrap();
        assert_eq!(identity.internal_id, 100);
        assert_eq!(identity.provider_id, "22371");
        assert_eq!(identity.archive_retention_days, 3);
        assert_eq!(identity.matched_by, IdNamespace::Provider);
        assert_eq!(identity.account.id, 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_internal_id() {
        let identity = resolve_identity(&catalog(), &user(1), "100", &Diagnostics::default())
            .await
            .unwrap();
        assert_eq!(identity.internal_id, 100);
        assert_eq!(identity.matched_by, IdNamespace::Internal);
        assert_eq!(identity.provider_id, "22371");
    }

    #[tokio::test]
    async fn test_provider_namespace_wins_over_internal() {
        // 501 is both an XC provider id (stream 12 on CNN) and an internal channel id
        let identity = resolve_identity(&catalog(), &user(1), "501", &Diagnostics::default())
            .await;
        // CNN's first-priority stream is STD, so eligibility fails on CNN
        assert!(matches!(
            identity,
            Err(TimeshiftError::WrongAccountType { ref channel, .. }) if channel == "CNN"
        ));
    }

    #[tokio::test]
    async fn test_not_found() {
        for id in ["999999", "abc", "800"] {
            let err = resolve_identity(&catalog(), &user(1), id, &Diagnostics::new(true))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "not_found", "id {id}");
        }
    }

    #[tokio::test]
    async fn test_archive_unsupported() {
        let err = resolve_identity(&catalog(), &user(1), "600", &Diagnostics::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "archive_unsupported");
    }

    #[tokio::test]
    async fn test_access_denied() {
        let err = resolve_identity(&catalog(), &user(1), "700", &Diagnostics::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");

        assert!(
            resolve_identity(&catalog(), &user(5), "700", &Diagnostics::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let catalog = catalog();
        let first = resolve_identity(&catalog, &user(1), "22371", &Diagnostics::default())
            .await
            .unwrap();
        for _ in 0..5 {
            let again = resolve_identity(&catalog, &user(1), "22371", &Diagnostics::default())
                .await
                .unwrap();
            assert_eq!(again, first);
        }
    }

    #[tokio::test]
    async fn test_authenticate() {
        let snapshot: CatalogSnapshot = serde_json::from_value(json!({
            "users": [
                {"id": 1, "username": "john", "custom_properties": {"xc_password": "secret123"}},
                {"id": 2, "username": "jane"}
            ]
        }))
        .unwrap();
        let users = InMemoryCatalog::new(snapshot);

        assert!(authenticate(&users, "john", "secret123").await.is_ok());
        for (name, pass) in [("john", "nope"), ("jane", ""), ("ghost", "x")] {
            let err = authenticate(&users, name, pass).await.unwrap_err();
            assert_eq!(err.kind(), "auth_failed");
        }
    }
}
