//! Runs one question through a chain and captures its run id.
//!
//! The run id is minted before the chain is invoked and is the id the tracer
//! records, so every invocation has exactly one correlation id and feedback
//! can target it. Tracer failures are logged and never fail the turn; chain
//! failures are reported to the tracer and then returned unchanged.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChatResult;
use crate::models::QueryAnswer;
use crate::traits::{Chain, RunTracer};

const RUN_NAME: &str = "RetrievalChain";

pub struct QueryOrchestrator {
    tracer: Arc<dyn RunTracer>,
}

impl QueryOrchestrator {
    pub fn new(tracer: Arc<dyn RunTracer>) -> Self {
        Self { tracer }
    }

    pub async fn ask(&self, chain: &dyn Chain, question: &str) -> ChatResult<QueryAnswer> {
        let run_id = Uuid::new_v4();
        let metadata = chain.metadata();
        let inputs = json!({
            "question": question,
            "filter": metadata,
        });

        if let Err(e) = self.tracer.start_run(run_id, RUN_NAME, inputs).await {
            warn!(%run_id, error = %e, "could not start trace run");
        }

        debug!(%run_id, filename = %metadata.filename, "invoking chain");
        let result = chain.invoke(question).await;

        let outcome = match &result {
            Ok(output) => Ok(json!({ "answer": output.answer })),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = self.tracer.end_run(run_id, outcome).await {
            warn!(%run_id, error = %e, "could not close trace run");
        }

        let output = result?;
        Ok(QueryAnswer {
            answer: output.answer,
            run_id,
        })
    }
}
