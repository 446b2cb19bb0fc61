//! Tests for `MatchService` gRPC implementation.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::{Code, Request};

use meetsmatch_core::models::{Location, User};
use meetsmatch_core::Config;
use meetsmatch_proto::v1::match_service_server::MatchService;
use meetsmatch_proto::v1::{
    CreateMatchRequest, DislikeMatchRequest, GetMatchListRequest, GetMatchRequest,
    GetPotentialMatchesRequest, LikeMatchRequest, MatchStatus, SkipMatchRequest,
    UpdateLastActiveRequest,
};

use super::match_svc::MatchServiceImpl;
use crate::cache::MemoryStore;
use crate::gateway::MatchGateway;
use crate::storage::MatchDatabase;

fn profile(id: &str, interests: &[&str]) -> User {
    User {
        id: id.into(),
        first_name: id.into(),
        interests: interests.iter().map(|s| (*s).to_string()).collect(),
        location: Some(Location::new(37.5665, 126.9780)),
        is_active: true,
        is_profile_complete: true,
        ..User::default()
    }
}

async fn setup_with(config: &Config) -> MatchServiceImpl {
    let db = MatchDatabase::open_in_memory().await.unwrap();
    for u in [
        profile("alice", &["hiking", "jazz"]),
        profile("bob", &["hiking", "jazz"]),
        profile("carol", &["golf"]),
    ] {
        db.upsert_user(&u).await.unwrap();
    }
    let gateway = MatchGateway::from_config(db, Arc::new(MemoryStore::new()), config);
    MatchServiceImpl::new(Arc::new(gateway), CancellationToken::new())
}

async fn setup() -> MatchServiceImpl {
    let mut config = Config::default();
    config.rate_limit.capacity = 1000;
    setup_with(&config).await
}

async fn create(svc: &MatchServiceImpl, a: &str, b: &str) -> meetsmatch_proto::v1::Match {
    svc.create_match(Request::new(CreateMatchRequest {
        user1_id: a.into(),
        user2_id: b.into(),
    }))
    .await
    .unwrap()
    .into_inner()
    .r#match
    .unwrap()
}

async fn like(svc: &MatchServiceImpl, match_id: &str, user_id: &str) -> (i32, bool) {
    let resp = svc
        .like_match(Request::new(LikeMatchRequest {
            match_id: match_id.into(),
            user_id: user_id.into(),
        }))
        .await
        .unwrap()
        .into_inner();
    (resp.r#match.unwrap().status, resp.is_mutual)
}

#[tokio::test]
async fn potential_matches_are_ranked_with_parallel_scores() {
    let svc = setup().await;
    let resp = svc
        .get_potential_matches(Request::new(GetPotentialMatchesRequest {
            user_id: "alice".into(),
            limit: 0,
        }))
        .await
        .unwrap()
        .into_inner();

    let ids: Vec<_> = resp.potential_matches.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "carol"]);
    assert_eq!(resp.scores.len(), resp.potential_matches.len());
    assert!(resp.scores[0].total >= resp.scores[1].total);
}

#[tokio::test]
async fn create_match_is_idempotent_across_order() {
    let svc = setup().await;
    let first = create(&svc, "alice", "bob").await;
    let second = create(&svc, "bob", "alice").await;
    assert_eq!(first.id, second.id);
    assert_eq!(first.status, MatchStatus::Pending as i32);
    assert!(first.created_at.is_some());
    assert!(first.matched_at.is_none());
}

#[tokio::test]
async fn mutual_like_flow() {
    let svc = setup().await;
    let m = create(&svc, "alice", "bob").await;

    assert_eq!(like(&svc, &m.id, "alice").await, (MatchStatus::Pending as i32, false));
    assert_eq!(like(&svc, &m.id, "bob").await, (MatchStatus::Matched as i32, true));

    let fetched = svc
        .get_match(Request::new(GetMatchRequest {
            match_id: m.id.clone(),
        }))
        .await
        .unwrap()
        .into_inner()
        .r#match
        .unwrap();
    assert_eq!(fetched.status, MatchStatus::Matched as i32);
    assert!(fetched.matched_at.is_some());

    let list = svc
        .get_match_list(Request::new(GetMatchListRequest {
            user_id: "bob".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(list.matches.len(), 1);
    assert_eq!(list.matches[0].id, m.id);
}

#[tokio::test]
async fn dislike_rejects_and_skip_keeps_pending() {
    let svc = setup().await;
    let m = create(&svc, "alice", "carol").await;

    let skipped = svc
        .skip_match(Request::new(SkipMatchRequest {
            match_id: m.id.clone(),
            user_id: "carol".into(),
        }))
        .await
        .unwrap()
        .into_inner()
        .r#match
        .unwrap();
    assert_eq!(skipped.status, MatchStatus::Pending as i32);

    let rejected = svc
        .dislike_match(Request::new(DislikeMatchRequest {
            match_id: m.id,
            user_id: "alice".into(),
        }))
        .await
        .unwrap()
        .into_inner()
        .r#match
        .unwrap();
    assert_eq!(rejected.status, MatchStatus::Rejected as i32);
}

#[tokio::test]
async fn error_codes() {
    let svc = setup().await;

    let err = svc
        .get_potential_matches(Request::new(GetPotentialMatchesRequest {
            user_id: String::new(),
            limit: 5,
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = svc
        .get_match(Request::new(GetMatchRequest {
            match_id: "missing".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = svc
        .create_match(Request::new(CreateMatchRequest {
            user1_id: "alice".into(),
            user2_id: "alice".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let m = create(&svc, "alice", "bob").await;
    let err = svc
        .like_match(Request::new(LikeMatchRequest {
            match_id: m.id,
            user_id: "carol".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn rate_limited_callers_get_resource_exhausted() {
    let mut config = Config::default();
    config.rate_limit.capacity = 1;
    config.rate_limit.refill_interval_ms = 3_600_000;
    let svc = setup_with(&config).await;

    let req = || {
        Request::new(GetMatchListRequest {
            user_id: "alice".into(),
        })
    };
    assert!(svc.get_match_list(req()).await.is_ok());
    let err = svc.get_match_list(req()).await.unwrap_err();
    assert_eq!(err.code(), Code::ResourceExhausted);
}

#[tokio::test]
async fn update_last_active_reports_acceptance() {
    let svc = setup().await;
    let req = || {
        Request::new(UpdateLastActiveRequest {
            user_id: "alice".into(),
        })
    };
    assert!(svc.update_last_active(req()).await.unwrap().into_inner().accepted);
    assert!(!svc.update_last_active(req()).await.unwrap().into_inner().accepted);
}
