//! Query side of the scheduler client.
//!
//! Forwards calls to the scheduler service. `select_destinations` sits on
//! the instance-build path and retries once on a transient timeout through
//! `RetryPolicy`; the aggregate calls are plain passthroughs.

use std::sync::Arc;

use nimbus_core::RequestContext;
use tracing::debug;

use crate::error::SchedulerResult;
use crate::retry::RetryPolicy;
use crate::rpc::{Aggregate, Destination, FilterProperties, RequestSpec, SchedulerRpc};

pub struct QueryClient {
    rpc: Arc<dyn SchedulerRpc>,
    retry: RetryPolicy,
}

impl QueryClient {
    pub fn new(rpc: Arc<dyn SchedulerRpc>) -> Self {
        Self {
            rpc,
            retry: RetryPolicy,
        }
    }

    /// Ask the scheduler for hosts that can take `request_spec`.
    ///
    /// A timeout is retried once with identical arguments; a second
    /// timeout is returned to the caller.
    pub fn select_destinations(
        &self,
        ctx: &RequestContext,
        request_spec: &RequestSpec,
        filter_properties: &FilterProperties,
    ) -> SchedulerResult<Vec<Destination>> {
        let destinations = self.retry.run("select_destinations", || {
            self.rpc.select_destinations(ctx, request_spec, filter_properties)
        })?;
        debug!(
            request_id = %ctx.request_id,
            count = destinations.len(),
            "destinations selected"
        );
        Ok(destinations)
    }

    pub fn update_aggregates(
        &self,
        ctx: &RequestContext,
        aggregates: &[Aggregate],
    ) -> SchedulerResult<()> {
        self.rpc.update_aggregates(ctx, aggregates)?;
        debug!(request_id = %ctx.request_id, count = aggregates.len(), "aggregates updated");
        Ok(())
    }

    pub fn delete_aggregate(
        &self,
        ctx: &RequestContext,
        aggregate: &Aggregate,
    ) -> SchedulerResult<()> {
        self.rpc.delete_aggregate(ctx, aggregate)?;
        debug!(request_id = %ctx.request_id, aggregate_id = aggregate.id, "aggregate deleted");
        Ok(())
    }
}
