use coopvote::core::common::{Clock, ManualClock, MemberId, ScopeId, SystemClock, VotingConfig};
use coopvote::core::storage::{
    FileStorage, MemoryStorage, Revision, Storage, StorageError, StorageResult, Versioned,
};
use coopvote::systems::governance::{ErrorKind, ResolutionDraft, VoteOption, VoteRequest, VotingService};
use coopvote::systems::identity::{CallerContext, Member, MemberRegistry, Role};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::error::Error;
use std::sync::Arc;
use tempfile::tempdir;

const VOTERS: usize = 24;

fn voter(i: usize) -> CallerContext {
    CallerContext::new(
        MemberId::parse(format!("socio-{}", i)).unwrap(),
        format!("Socio {}", i),
        ScopeId::parse("coop1").unwrap(),
        Role::Member,
    )
}

fn admin() -> CallerContext {
    CallerContext::new(
        MemberId::parse("admin").unwrap(),
        "Ada Admin",
        ScopeId::parse("coop1").unwrap(),
        Role::CooperativeAdmin,
    )
}

async fn setup_service(
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    config: &VotingConfig,
) -> Result<Arc<VotingService>, Box<dyn Error>> {
    let registry = Arc::new(MemberRegistry::new(storage.clone()));
    for i in 0..VOTERS {
        let caller = voter(i);
        let member = Member::from_display_name(caller.member_id, caller.scope_id, &caller.display_name, Role::Member);
        registry.register(&member).await?;
    }
    Ok(Arc::new(VotingService::new(storage, registry, clock, config)))
}

fn contended_config() -> VotingConfig {
    VotingConfig {
        max_update_retries: 200,
        retry_backoff_ms: 1,
        ..VotingConfig::default()
    }
}

async fn vote_concurrently(service: Arc<VotingService>, id: &str) -> Result<(), Box<dyn Error>> {
    let tasks: Vec<_> = (0..VOTERS)
        .map(|i| {
            let service = service.clone();
            let id = id.to_string();
            tokio::spawn(async move {
                let option = ["Yes", "No", "Abstain"][i % 3];
                service.cast_vote(&voter(i), &id, VoteRequest::direct(option)).await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result??;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_are_not_lost() -> Result<(), Box<dyn Error>> {
    let service = setup_service(
        Arc::new(MemoryStorage::new()),
        Arc::new(SystemClock),
        &contended_config(),
    )
    .await?;
    let id = service
        .create_resolution(&admin(), "coop1", ResolutionDraft::new("Adopt budget", 60))
        .await?
        .to_string();

    vote_concurrently(service.clone(), &id).await?;

    let tally = service.tally(&admin(), &id).await?;
    assert_eq!(tally.total(), VOTERS);
    assert_eq!(tally.count(VoteOption::Yes), VOTERS / 3);
    assert_eq!(tally.count(VoteOption::No), VOTERS / 3);
    assert_eq!(tally.count(VoteOption::Abstain), VOTERS / 3);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_backed_votes_survive_reopen() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().to_path_buf();

    let id = {
        let storage = Arc::new(FileStorage::new(path.clone())?);
        let service = setup_service(storage, Arc::new(SystemClock), &contended_config()).await?;
        let id = service
            .create_resolution(&admin(), "coop1", ResolutionDraft::new("Adopt budget", 60))
            .await?
            .to_string();
        vote_concurrently(service, &id).await?;
        id
    };

    let storage = Arc::new(FileStorage::new(path)?);
    let registry = Arc::new(MemberRegistry::new(storage.clone()));
    let service = VotingService::new(storage, registry, Arc::new(SystemClock), &VotingConfig::default());

    let resolution = service.get_resolution(&voter(0), &id).await?;
    assert_eq!(resolution.title, "Adopt budget");
    assert_eq!(resolution.ballots.len(), VOTERS);

    let detail = service.ballot_detail(&voter(0), &id).await?;
    assert_eq!(detail.len(), VOTERS);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_services_sharing_a_data_dir_keep_every_vote() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempdir()?;
    let config = contended_config();

    // Two independent handles, as two CLI invocations would open
    let first = setup_service(
        Arc::new(FileStorage::new(temp_dir.path().to_path_buf())?),
        Arc::new(SystemClock),
        &config,
    )
    .await?;
    let storage = Arc::new(FileStorage::new(temp_dir.path().to_path_buf())?);
    let registry = Arc::new(MemberRegistry::new(storage.clone()));
    let second = Arc::new(VotingService::new(storage, registry, Arc::new(SystemClock), &config));

    let id = first
        .create_resolution(&admin(), "coop1", ResolutionDraft::new("Adopt budget", 60))
        .await?
        .to_string();

    let tasks: Vec<_> = (0..VOTERS)
        .map(|i| {
            let service = if i % 2 == 0 { first.clone() } else { second.clone() };
            let id = id.clone();
            tokio::spawn(async move { service.cast_vote(&voter(i), &id, VoteRequest::direct("Yes")).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result??;
    }

    let resolution = second.get_resolution(&admin(), &id).await?;
    assert_eq!(resolution.ballots.len(), VOTERS);
    assert_eq!(first.tally(&admin(), &id).await?.count(VoteOption::Yes), VOTERS);

    Ok(())
}

/// Storage whose conditional writes always lose the race
struct AlwaysStale {
    inner: MemoryStorage,
}

#[async_trait]
impl Storage for AlwaysStale {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<Revision> {
        self.inner.put(key, data).await
    }

    async fn get_with_revision(&self, key: &str) -> StorageResult<Versioned<Vec<u8>>> {
        self.inner.get_with_revision(key).await
    }

    async fn put_if_revision(&self, key: &str, expected: Option<Revision>, data: &[u8]) -> StorageResult<Revision> {
        match expected {
            // Creation goes through
            None => self.inner.put_if_revision(key, None, data).await,
            Some(revision) => Err(StorageError::RevisionConflict {
                key: key.to_string(),
                expected: Some(revision),
                actual: Some(revision + 1),
            }),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

#[tokio::test]
async fn test_exhausted_retries_report_concurrency() -> Result<(), Box<dyn Error>> {
    let storage = Arc::new(AlwaysStale {
        inner: MemoryStorage::new(),
    });
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 18, 0, 0).unwrap()));
    let config = VotingConfig {
        max_update_retries: 3,
        retry_backoff_ms: 0,
        ..VotingConfig::default()
    };
    let service = setup_service(storage.clone(), clock, &config).await?;

    let id = service
        .create_resolution(&admin(), "coop1", ResolutionDraft::new("Adopt budget", 60))
        .await?
        .to_string();

    let err = service
        .cast_vote(&voter(1), &id, VoteRequest::direct("Yes"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);

    assert!(service.get_resolution(&voter(1), &id).await?.ballots.is_empty());
    Ok(())
}
