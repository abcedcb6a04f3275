//! Account resolution and the Account reconciler
//!
//! Monitors name an Account explicitly or fall back to the single Account flagged
//! `isDefault`. The Account's API key lives in a Secret, by default in the operator's
//! cluster resource namespace.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{info, instrument, warn};

use super::events::{reason, warn_event, EventRecorder};
use super::reconciler::{Context, Next};
use super::store::ObjectStore;
use crate::config::OperatorConfig;
use crate::crd::{Account, AccountStatus};
use crate::error::{Error, Result};

/// Resolve the Account a Monitor should use
///
/// An explicit name must exist. Without one, exactly one Account must be flagged default;
/// zero or several is a configuration error that is never resolved by picking one.
pub async fn resolve_account<S>(store: &S, name: Option<&str>) -> Result<Account>
where
    S: ObjectStore + ?Sized,
{
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return store.get_account(name).await?.ok_or_else(|| Error::NotFound {
            kind: "Account",
            name: name.to_string(),
        });
    }

    let mut defaults = store.list_default_accounts().await?;
    match defaults.len() {
        0 => Err(Error::NoDefaultAccount),
        1 => Ok(defaults.remove(0)),
        count => Err(Error::MultipleDefaultAccounts(count)),
    }
}

/// Read the API key referenced by `account`
pub async fn resolve_api_key<S>(
    store: &S,
    config: &OperatorConfig,
    account: &Account,
) -> Result<String>
where
    S: ObjectStore + ?Sized,
{
    let secret_ref = &account.spec.api_key_secret_ref;
    let namespace = secret_ref
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(&config.cluster_resource_namespace);

    let secret = store
        .get_secret(namespace, &secret_ref.name)
        .await?
        .ok_or_else(|| Error::NotFound {
            kind: "Secret",
            name: format!("{}/{}", namespace, secret_ref.name),
        })?;

    let from_data = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&secret_ref.key))
        .map(|value| String::from_utf8_lossy(&value.0).into_owned());
    let from_string_data = || {
        secret
            .string_data
            .as_ref()
            .and_then(|data| data.get(&secret_ref.key))
            .cloned()
    };

    from_data
        .or_else(from_string_data)
        .ok_or_else(|| Error::KeyNotFound {
            secret: format!("{}/{}", namespace, secret_ref.name),
            key: secret_ref.key.clone(),
        })
}

/// Check that an Account's credentials authenticate and record it in `status.ready`
#[instrument(skip(account, ctx), fields(name = %account.name_any()))]
pub async fn reconcile_account<S, R>(account: Arc<Account>, ctx: Arc<Context<S, R>>) -> Result<Next>
where
    S: ObjectStore,
    R: EventRecorder,
{
    if account.metadata.deletion_timestamp.is_some() {
        return Ok(Next::AwaitChange);
    }

    let api_key = match resolve_api_key(&ctx.store, &ctx.config, &account).await {
        Ok(key) => key,
        Err(e) => {
            warn_event(&ctx.recorder, account.as_ref(), reason::GET_API_KEY_FAILED, &e).await;
            return Err(e);
        }
    };

    let client = ctx.pulsetic(api_key);
    let auth = client.list_page(1).await;
    let ready = auth.is_ok();

    let status = AccountStatus { ready };
    if account.status.as_ref() != Some(&status) {
        if let Err(e) = ctx.store.update_account_status(&account, &status).await {
            warn_event(&ctx.recorder, account.as_ref(), reason::UPDATE_STATUS_FAILED, &e).await;
            return Err(e);
        }
    }

    match auth {
        Ok(_) => {
            info!("Account {} authenticated", account.name_any());
            Ok(Next::AwaitChange)
        }
        Err(e) => {
            warn!("Account {} failed to authenticate: {}", account.name_any(), e);
            warn_event(&ctx.recorder, account.as_ref(), reason::AUTHENTICATION_FAILED, &e).await;
            Err(e.into())
        }
    }
}
