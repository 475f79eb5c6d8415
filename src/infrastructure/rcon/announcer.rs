use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use super::client::RconClient;
use crate::infrastructure::stage_interface::{
    RestartAnnouncer, RestartError, RestartPlan, RestartStep, COUNTDOWN_STEPS,
};

/// [`RestartAnnouncer`] speaking the Source RCON protocol over TCP
#[derive(Debug, Clone, Default)]
pub struct RconRestartAnnouncer;

impl RconRestartAnnouncer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RestartAnnouncer for RconRestartAnnouncer {
    async fn announce(&self, plan: &RestartPlan) -> Result<(), RestartError> {
        let client = RconClient::connect(&plan.address, &plan.password)
            .await
            .map_err(|e| RestartError::new(RestartStep::Connect, e))?;

        run_sequence(client, plan).await
    }
}

/// Warning, wait, ten-step countdown, restart command.
///
/// The first failing command ends the sequence. The connection is closed on
/// every path.
pub async fn run_sequence<S>(mut client: RconClient<S>, plan: &RestartPlan) -> Result<(), RestartError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let result = countdown(&mut client, plan).await;

    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to close remote console connection");
    }

    result
}

async fn countdown<S>(client: &mut RconClient<S>, plan: &RestartPlan) -> Result<(), RestartError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let warning = plan.messages.warning(plan.notice_secs());
    client
        .execute(&format!("say {}", warning))
        .await
        .map_err(|e| RestartError::new(RestartStep::AnnounceWarning, e))?;
    info!(notice_secs = plan.notice_secs(), "restart warning announced");

    tokio::time::sleep(plan.countdown_wait).await;

    for remaining in (1..=COUNTDOWN_STEPS).rev() {
        client
            .execute(&format!("say {}", plan.messages.countdown(remaining)))
            .await
            .map_err(|e| RestartError::new(RestartStep::Countdown(remaining), e))?;
        tokio::time::sleep(plan.countdown_tick).await;
    }

    client
        .execute(&plan.restart_command)
        .await
        .map_err(|e| RestartError::new(RestartStep::IssueRestartCommand, e))?;
    info!(command = %plan.restart_command, "restart command sent");

    Ok(())
}
