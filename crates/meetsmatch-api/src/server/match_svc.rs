//! `MatchService` gRPC implementation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::instrument;

use meetsmatch_proto::v1::match_service_server::MatchService;
use meetsmatch_proto::v1::{
    CreateMatchRequest, CreateMatchResponse, DislikeMatchRequest, DislikeMatchResponse,
    GetMatchListRequest, GetMatchListResponse, GetMatchRequest, GetMatchResponse,
    GetPotentialMatchesRequest, GetPotentialMatchesResponse, LikeMatchRequest, LikeMatchResponse,
    SkipMatchRequest, SkipMatchResponse, UpdateLastActiveRequest, UpdateLastActiveResponse,
};

use super::convert::{candidates_to_proto, match_to_proto};
use crate::gateway::MatchGateway;

pub struct MatchServiceImpl {
    gateway: Arc<MatchGateway>,
    shutdown: CancellationToken,
}

impl MatchServiceImpl {
    /// `shutdown` is the server-wide token; every request gets a child of it
    /// so in-flight work stops caching once the server is going down.
    pub const fn new(gateway: Arc<MatchGateway>, shutdown: CancellationToken) -> Self {
        Self { gateway, shutdown }
    }
}

#[tonic::async_trait]
impl MatchService for MatchServiceImpl {
    #[instrument(skip(self, request), fields(rpc = "GetPotentialMatches"))]
    async fn get_potential_matches(
        &self,
        request: Request<GetPotentialMatchesRequest>,
    ) -> Result<Response<GetPotentialMatchesResponse>, Status> {
        let req = request.into_inner();
        let cancel = self.shutdown.child_token();
        let ranked = self
            .gateway
            .potential_matches(&req.user_id, req.limit, &cancel)
            .await?;
        Ok(Response::new(candidates_to_proto(&ranked)))
    }

    #[instrument(skip(self, request), fields(rpc = "CreateMatch"))]
    async fn create_match(
        &self,
        request: Request<CreateMatchRequest>,
    ) -> Result<Response<CreateMatchResponse>, Status> {
        let req = request.into_inner();
        let cancel = self.shutdown.child_token();
        let m = self
            .gateway
            .create_match(&req.user1_id, &req.user2_id, &cancel)
            .await?;
        Ok(Response::new(CreateMatchResponse {
            r#match: Some(match_to_proto(&m)),
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "GetMatch"))]
    async fn get_match(
        &self,
        request: Request<GetMatchRequest>,
    ) -> Result<Response<GetMatchResponse>, Status> {
        let req = request.into_inner();
        let cancel = self.shutdown.child_token();
        let m = self.gateway.get_match(&req.match_id, &cancel).await?;
        Ok(Response::new(GetMatchResponse {
            r#match: Some(match_to_proto(&m)),
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "LikeMatch"))]
    async fn like_match(
        &self,
        request: Request<LikeMatchRequest>,
    ) -> Result<Response<LikeMatchResponse>, Status> {
        let req = request.into_inner();
        let outcome = self.gateway.like_match(&req.match_id, &req.user_id).await?;
        Ok(Response::new(LikeMatchResponse {
            r#match: Some(match_to_proto(&outcome.snapshot)),
            is_mutual: outcome.is_mutual,
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "DislikeMatch"))]
    async fn dislike_match(
        &self,
        request: Request<DislikeMatchRequest>,
    ) -> Result<Response<DislikeMatchResponse>, Status> {
        let req = request.into_inner();
        let m = self
            .gateway
            .dislike_match(&req.match_id, &req.user_id)
            .await?;
        Ok(Response::new(DislikeMatchResponse {
            r#match: Some(match_to_proto(&m)),
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "SkipMatch"))]
    async fn skip_match(
        &self,
        request: Request<SkipMatchRequest>,
    ) -> Result<Response<SkipMatchResponse>, Status> {
        let req = request.into_inner();
        let m = self.gateway.skip_match(&req.match_id, &req.user_id).await?;
        Ok(Response::new(SkipMatchResponse {
            r#match: Some(match_to_proto(&m)),
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "GetMatchList"))]
    async fn get_match_list(
        &self,
        request: Request<GetMatchListRequest>,
    ) -> Result<Response<GetMatchListResponse>, Status> {
        let req = request.into_inner();
        let cancel = self.shutdown.child_token();
        let matches = self.gateway.match_list(&req.user_id, &cancel).await?;
        Ok(Response::new(GetMatchListResponse {
            matches: matches.iter().map(match_to_proto).collect(),
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "UpdateLastActive"))]
    async fn update_last_active(
        &self,
        request: Request<UpdateLastActiveRequest>,
    ) -> Result<Response<UpdateLastActiveResponse>, Status> {
        let req = request.into_inner();
        let accepted = self.gateway.update_last_active(&req.user_id)?;
        Ok(Response::new(UpdateLastActiveResponse { accepted }))
    }
}
