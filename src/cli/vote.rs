//! Vote command: drive a voting controller for one item.

use super::write_line;
use crate::client::{
    ClientStorage, FileClientStorage, HttpVoteGateway, SessionVoteGateway, VISITOR_ID_KEY,
    VoteGateway, VoteOutcome, VoteState, VotingController, load_json, save_json,
};
use crate::config::VotesConfig;
use crate::models::{ItemId, VoterId};
use crate::{Error, Result};
use std::io::Write;
use std::sync::Arc;

/// Where the vote goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteMode {
    /// Through the HTTP vote API.
    Server,
    /// Counted in the local client storage only.
    Local,
}

/// Votes for `item_id` and prints the outcome and the new ranking.
///
/// Client state (voted items, local counts, the visitor cookie) lives in the
/// configured client storage file, so repeated runs behave like one browser.
///
/// # Errors
///
/// Returns an error if the vote fails or output cannot be written.
pub async fn run_vote(
    config: &VotesConfig,
    item_id: ItemId,
    mode: VoteMode,
    out: &mut impl Write,
) -> Result<()> {
    if item_id.is_blank() {
        return Err(Error::InvalidInput("itemId is required".to_string()));
    }

    let storage = Arc::new(FileClientStorage::new(&config.client.storage_path));
    let mut items = config.client.items.clone();
    if !items.contains(&item_id) {
        items.push(item_id.clone());
    }

    match mode {
        VoteMode::Local => {
            let gateway = SessionVoteGateway::new(Arc::clone(&storage));
            let controller = VotingController::load(items, gateway, storage).await;
            drive(&controller, &item_id, out).await
        },
        VoteMode::Server => {
            let visitor = load_json::<VoterId>(&storage, VISITOR_ID_KEY).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring unreadable visitor id");
                None
            });
            let gateway =
                HttpVoteGateway::new(config.client.api_base_url.as_str())?.with_visitor(visitor);
            let controller = VotingController::load(items, gateway, Arc::clone(&storage)).await;
            let result = drive(&controller, &item_id, out).await;

            if let Some(visitor) = controller.gateway().visitor() {
                if let Err(e) = save_json(&storage, VISITOR_ID_KEY, &visitor) {
                    tracing::warn!(error = %e, "Failed to save visitor id");
                }
            }
            result
        },
    }
}

async fn drive<G: VoteGateway, S: ClientStorage>(
    controller: &VotingController<G, S>,
    item_id: &ItemId,
    out: &mut impl Write,
) -> Result<()> {
    let outcome = controller.vote(item_id).await;
    write_line(out, &render_outcome(item_id, outcome.as_ref()))?;

    for view in controller.snapshot() {
        let marker = match view.state {
            VoteState::Voted => "voted",
            VoteState::Submitting => "voting",
            VoteState::Unvoted => "",
        };
        write_line(
            out,
            format!("{:>6}  {}  {marker}", view.count, view.item_id)
                .trim_end(),
        )?;
    }

    match outcome {
        Some(VoteOutcome::Failed { message }) => Err(Error::OperationFailed {
            operation: "vote".to_string(),
            cause: message,
        }),
        _ => Ok(()),
    }
}

/// Renders the one-line summary of a vote attempt.
#[must_use]
pub fn render_outcome(item_id: &ItemId, outcome: Option<&VoteOutcome>) -> String {
    match outcome {
        Some(VoteOutcome::Counted { count }) => {
            format!("Voted for item {item_id} ({count} votes)")
        },
        Some(VoteOutcome::AlreadyCounted) | None => {
            format!("Already voted for item {item_id}")
        },
        Some(VoteOutcome::Failed { message }) => message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{VOTE_FAILED_MESSAGE, VOTED_ITEMS_KEY};

    fn local_config(dir: &tempfile::TempDir) -> VotesConfig {
        let mut config = VotesConfig::default();
        config.client.storage_path = dir.path().join("client.json");
        config.client.items = vec![ItemId::new("1"), ItemId::new("2")];
        config
    }

    #[tokio::test]
    async fn test_local_vote_persists_between_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = local_config(&dir);

        let mut first = Vec::new();
        run_vote(&config, ItemId::new("2"), VoteMode::Local, &mut first)
            .await
            .unwrap();
        let first = String::from_utf8(first).unwrap();
        assert!(first.starts_with("Voted for item 2 (1 votes)"));

        let mut second = Vec::new();
        run_vote(&config, ItemId::new("2"), VoteMode::Local, &mut second)
            .await
            .unwrap();
        assert!(String::from_utf8(second).unwrap().starts_with("Already voted for item 2"));

        let storage = FileClientStorage::new(&config.client.storage_path);
        assert_eq!(
            storage.get(VOTED_ITEMS_KEY).unwrap().as_deref(),
            Some(r#"["2"]"#)
        );
    }

    #[tokio::test]
    async fn test_unknown_item_is_added_to_page() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = local_config(&dir);

        let mut out = Vec::new();
        run_vote(&config, ItemId::new("9"), VoteMode::Local, &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let ranking_line = text.lines().nth(1).unwrap();
        assert!(ranking_line.contains(" 9"));
        assert!(ranking_line.ends_with("voted"));
    }

    #[tokio::test]
    async fn test_blank_item_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = run_vote(&local_config(&dir), ItemId::new(""), VoteMode::Local, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_render_outcome() {
        let item = ItemId::new("4");
        assert_eq!(
            render_outcome(&item, Some(&VoteOutcome::Counted { count: 2 })),
            "Voted for item 4 (2 votes)"
        );
        assert_eq!(render_outcome(&item, None), "Already voted for item 4");
        assert_eq!(
            render_outcome(
                &item,
                Some(&VoteOutcome::Failed {
                    message: VOTE_FAILED_MESSAGE.to_string()
                })
            ),
            VOTE_FAILED_MESSAGE
        );
    }
}
