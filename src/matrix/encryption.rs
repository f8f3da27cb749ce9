//! Login and end-to-end encryption setup of the bot account.
//!
//! Encrypted delivery only works if the bot device is part of the account's
//! cross-signing trust chain and can reach its secrets, so the client is not
//! handed out before [`check_device`] passes.

use anyhow::bail;
use log::{debug, info};
use matrix_sdk::{
    Client,
    encryption::{
        BackupDownloadStrategy, EncryptionSettings,
        recovery::{RecoveryError, RecoveryState},
    },
    ruma::{OwnedUserId, api::client::uiaa},
};

use crate::matrix::{UserCredentials, session::SessionFile};

const DEVICE_DISPLAY_NAME: &str = "roomlink daemon";

/// Bootstraps cross-signing, answering the password challenge if the server asks for one.
async fn bootstrap_cross_signing(
    client: &Client,
    credentials: &UserCredentials,
) -> anyhow::Result<()> {
    let Err(e) = client
        .encryption()
        .bootstrap_cross_signing_if_needed(None)
        .await
    else {
        debug!("cross signing ready");
        return Ok(());
    };

    let Some(response) = e.as_uiaa_response() else {
        bail!("cross signing bootstrap failed: {:?}", e);
    };

    let mut password = uiaa::Password::new(
        uiaa::UserIdentifier::UserIdOrLocalpart(credentials.user_id.clone()),
        credentials.password.clone(),
    );
    password.session = response.session.clone();

    client
        .encryption()
        .bootstrap_cross_signing(Some(uiaa::AuthData::Password(password)))
        .await?;

    debug!("cross signing bootstrapped with password");
    Ok(())
}

/// Enables key backup and secret storage protected by the passphrase.
async fn enable_recovery(client: &Client, credentials: &UserCredentials) -> anyhow::Result<()> {
    match client
        .encryption()
        .recovery()
        .enable()
        .with_passphrase(&credentials.passphrase)
        .await
    {
        Ok(_) => debug!("recovery enabled"),
        Err(RecoveryError::BackupExistsOnServer) => debug!("recovery already enabled"),
        Err(e) => bail!("failed to enable recovery: {:?}", e),
    }

    Ok(())
}

/// Fails unless recovery is enabled and the bot device is verified.
async fn check_device(client: &Client) -> anyhow::Result<()> {
    if client.encryption().recovery().state() != RecoveryState::Enabled {
        bail!("recovery is not enabled");
    }

    let Some(device) = client.encryption().get_own_device().await? else {
        bail!("own device is unknown to the crypto store");
    };
    if !device.is_verified() {
        bail!("device {} is not verified", device.device_id());
    }

    Ok(())
}

/// Logs in with the password and sets up encryption from scratch.
async fn login(credentials: &UserCredentials, session: &mut SessionFile) -> anyhow::Result<Client> {
    let bot: OwnedUserId = credentials.user_id.clone().try_into()?;
    let client = Client::builder()
        .sqlite_store(session.sqlite_path(), Some(&credentials.passphrase))
        .with_encryption_settings(EncryptionSettings {
            auto_enable_cross_signing: true,
            backup_download_strategy: BackupDownloadStrategy::default(),
            auto_enable_backups: true,
        })
        .server_name(bot.server_name())
        .build()
        .await?;

    client
        .matrix_auth()
        .login_username(&bot, &credentials.password)
        .initial_device_display_name(DEVICE_DISPLAY_NAME)
        .send()
        .await?;
    info!("logged in as {}", bot);

    bootstrap_cross_signing(&client, credentials).await?;
    enable_recovery(&client, credentials).await?;
    client
        .encryption()
        .recovery()
        .recover(&credentials.passphrase)
        .await?;
    check_device(&client).await?;

    let Some(user_session) = client.matrix_auth().session() else {
        bail!("no session after login");
    };
    session.persist_user_session(&user_session).await?;

    Ok(client)
}

/// Restores the persisted session and imports the encryption secrets.
async fn restore(credentials: &UserCredentials, session: &SessionFile) -> anyhow::Result<Client> {
    let Some(user_session) = session.user_session() else {
        bail!("no persisted session to restore");
    };

    let bot: OwnedUserId = credentials.user_id.clone().try_into()?;
    let client = Client::builder()
        .server_name(bot.server_name())
        .sqlite_store(session.sqlite_path(), Some(&credentials.passphrase))
        .build()
        .await?;

    client.restore_session(user_session.clone()).await?;

    client
        .encryption()
        .secret_storage()
        .open_secret_store(&credentials.passphrase)
        .await?
        .import_secrets()
        .await?;
    check_device(&client).await?;

    info!("session of {} restored", bot);
    Ok(client)
}

/// Returns an authenticated client ready for encrypted messaging.
///
/// Restores the session found on disk, or logs in and persists a new one.
pub async fn setup_client(
    credentials: &UserCredentials,
    session: &mut SessionFile,
) -> anyhow::Result<Client> {
    if session.has_session() {
        restore(credentials, session).await
    } else {
        login(credentials, session).await
    }
}
