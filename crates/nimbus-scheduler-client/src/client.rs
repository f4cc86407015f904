//! `SchedulerClient` — one handle for both halves of the scheduler client.
//!
//! The query and report clients are independent; the façade only holds
//! each in a `LazyLoader` so neither is built until something calls it.

use std::sync::Arc;

use nimbus_core::{HostIdentity, RequestContext};
use nimbus_state::ComputeNodeStore;

use crate::error::SchedulerResult;
use crate::lazy::LazyLoader;
use crate::query::QueryClient;
use crate::report::{ReportClient, ResourceStats};
use crate::rpc::{Aggregate, Destination, FilterProperties, RequestSpec, SchedulerRpc};

#[derive(Debug)]
pub struct SchedulerClient {
    query: LazyLoader<QueryClient>,
    report: LazyLoader<ReportClient>,
}

impl SchedulerClient {
    /// Wire the façade to a scheduler transport and a compute node store.
    pub fn new(rpc: Arc<dyn SchedulerRpc>, store: Arc<dyn ComputeNodeStore>) -> Self {
        Self::with_loaders(
            move || QueryClient::new(rpc.clone()),
            move || ReportClient::new(store.clone()),
        )
    }

    /// Build the façade from sub-client factories.
    pub fn with_loaders(
        query: impl Fn() -> QueryClient + Send + Sync + 'static,
        report: impl Fn() -> ReportClient + Send + Sync + 'static,
    ) -> Self {
        Self {
            query: LazyLoader::new(query),
            report: LazyLoader::new(report),
        }
    }

    pub fn query_client(&self) -> &LazyLoader<QueryClient> {
        &self.query
    }

    pub fn report_client(&self) -> &LazyLoader<ReportClient> {
        &self.report
    }

    pub fn select_destinations(
        &self,
        ctx: &RequestContext,
        request_spec: &RequestSpec,
        filter_properties: &FilterProperties,
    ) -> SchedulerResult<Vec<Destination>> {
        self.query
            .get()
            .select_destinations(ctx, request_spec, filter_properties)
    }

    pub fn update_aggregates(
        &self,
        ctx: &RequestContext,
        aggregates: &[Aggregate],
    ) -> SchedulerResult<()> {
        self.query.get().update_aggregates(ctx, aggregates)
    }

    pub fn delete_aggregate(
        &self,
        ctx: &RequestContext,
        aggregate: &Aggregate,
    ) -> SchedulerResult<()> {
        self.query.get().delete_aggregate(ctx, aggregate)
    }

    pub fn update_resource_stats(
        &self,
        ctx: &RequestContext,
        host: &HostIdentity,
        stats: &ResourceStats,
    ) -> SchedulerResult<()> {
        self.report.get().update_resource_stats(ctx, host, stats)
    }
}
