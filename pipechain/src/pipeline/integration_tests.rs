//! Integration tests for serial pipeline execution.

#[cfg(test)]
mod tests {
    use crate::config::ExecutorConfig;
    use crate::context::{DataKey, StageContext};
    use crate::core::{MessageKind, ProcessorResponse};
    use crate::errors::PipelineError;
    use crate::events::{CollectingEventSink, PIPELINE_COMPLETED, PIPELINE_FAILED, PIPELINE_STARTED};
    use crate::pipeline::{
        CollectingHandler, Pipeline, PipelineExecutor, ResponseHandler, SerialPipelineExecutor,
    };
    use crate::processors::{FnProcessor, PassThroughProcessor, Processor};
    use crate::testing::{
        assert_balanced, assert_error_code, assert_starved, assert_steps, forwarding_chain,
        CallLog, FailingHandler, FailingProcessor, OverreachingProcessor, RecordingProcessor,
        SilentProcessor, TerminalProcessor,
    };
    use async_trait::async_trait;
    use mockall::{mock, Sequence};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const ITEMS: DataKey<u32> = DataKey::new("items");
    const EOPS: DataKey<u32> = DataKey::new("eops");
    const TAG: DataKey<String> = DataKey::new("tag");

    mock! {
        Handler {}
        impl ResponseHandler<String> for Handler {
            fn handle(&mut self, response: String) -> anyhow::Result<()>;
        }
    }

    #[derive(Debug)]
    struct DelayedForwarder {
        name: String,
        delay: Duration,
    }

    #[async_trait]
    impl Processor<String, String> for DelayedForwarder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle_request(
            &self,
            request: String,
            ctx: &mut StageContext<String, String>,
        ) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            ctx.send_request(format!("{request}+{}", self.name))?;
            Ok(())
        }
    }

    /// Streams one item, yields to the runtime, then checks the caller
    /// already has that item before finishing.
    #[derive(Debug)]
    struct StreamingProcessor {
        delivered: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Processor<String, String> for StreamingProcessor {
        fn name(&self) -> &str {
            "stream"
        }

        async fn handle_request(
            &self,
            request: String,
            ctx: &mut StageContext<String, String>,
        ) -> anyhow::Result<()> {
            ctx.send_item(format!("{request}-1"));
            tokio::task::yield_now().await;
            if self.delivered.lock().is_empty() {
                anyhow::bail!("first item still pending after the callback yielded");
            }
            ctx.send_item(format!("{request}-2"));
            ctx.send_eop();
            Ok(())
        }
    }

    /// Forwards its request, asks for a second one after the first item
    /// comes back, and sends end-of-pipe once both branches have finished.
    fn two_round_processor() -> FnProcessor<String, String> {
        FnProcessor::new("rounds", |req: String, ctx: &mut StageContext<String, String>| {
            ctx.send_request(req)?;
            Ok(())
        })
        .on_response(|resp, ctx| {
            match resp {
                ProcessorResponse::Item(item) => {
                    let seen = ctx.get(ITEMS).copied().unwrap_or(0) + 1;
                    ctx.put(ITEMS, seen);
                    if seen == 1 {
                        ctx.send_request("second".to_string())?;
                    }
                    ctx.send_item(item);
                }
                ProcessorResponse::Eop => {
                    let eops = ctx.get(EOPS).copied().unwrap_or(0) + 1;
                    ctx.put(EOPS, eops);
                    if eops == 2 {
                        ctx.send_eop();
                    }
                }
            }
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_forwarding_chain_step_count() {
        let executor = SerialPipelineExecutor::new();

        for len in 1..=5_u64 {
            let pipeline = forwarding_chain(len as usize, &[]);
            let mut handler = CollectingHandler::new();
            let summary = executor
                .execute(&pipeline, "GetMap".to_string(), &mut handler)
                .await
                .unwrap();

            assert_steps(&summary, 2 * len - 1);
            assert_balanced(&summary);
            assert_eq!(summary.requests_processed, len);
            assert!(handler.is_empty());
        }
    }

    #[tokio::test]
    async fn test_single_stage_pipeline() {
        let pipeline = Pipeline::builder("single")
            .processor(
                TerminalProcessor::new("answer").with_responses(vec!["tile".to_string()]),
            )
            .build()
            .unwrap();

        let (responses, summary) = SerialPipelineExecutor::new()
            .collect(&pipeline, "GetMap".to_string())
            .await
            .unwrap();

        assert_eq!(responses, vec!["tile".to_string()]);
        assert_steps(&summary, 1);
        assert_eq!(summary.responses_delivered, 1);
        assert_eq!(summary.stage_count, 1);
    }

    #[tokio::test]
    async fn test_items_pass_through_every_stage() {
        let pipeline = forwarding_chain(3, &["a", "b"]);
        let (responses, summary) = SerialPipelineExecutor::new()
            .collect(&pipeline, "GetFeature".to_string())
            .await
            .unwrap();

        assert_eq!(responses, vec!["a".to_string(), "b".to_string()]);
        // Three requests, then two items and end-of-pipe through two stages.
        assert_steps(&summary, 9);
        assert_eq!(summary.responses_processed, 6);
        assert_eq!(summary.pipeline, "chain-3");
    }

    #[tokio::test]
    async fn test_lowest_stage_and_request_first() {
        let log = CallLog::new();
        let pipeline = Pipeline::builder("rounds")
            .processor(RecordingProcessor::new(two_round_processor(), log.clone()))
            .processor(RecordingProcessor::new(
                PassThroughProcessor::new("pass"),
                log.clone(),
            ))
            .processor(RecordingProcessor::new(
                TerminalProcessor::new("answer").with_responses(vec!["x".to_string()]),
                log.clone(),
            ))
            .build()
            .unwrap();

        let (responses, summary) = SerialPipelineExecutor::new()
            .collect(&pipeline, "first".to_string())
            .await
            .unwrap();

        use MessageKind::{Request as Rq, Response as Rs};
        assert_eq!(
            log.trace(),
            vec![
                (0, Rq),
                (1, Rq),
                (2, Rq),
                (1, Rs),
                (0, Rs),
                // Stage 1 now holds the second request and end-of-pipe.
                (1, Rq),
                (1, Rs),
                (0, Rs),
                (2, Rq),
                (1, Rs),
                (0, Rs),
                (1, Rs),
                (0, Rs),
            ]
        );
        assert_eq!(responses, vec!["x".to_string(), "x".to_string()]);
        assert_steps(&summary, 13);

        let eops: Vec<usize> = log
            .records()
            .iter()
            .filter(|r| r.eop)
            .map(|r| r.stage)
            .collect();
        assert_eq!(eops, vec![1, 0, 1, 0]);
    }

    #[tokio::test]
    async fn test_stage_data_is_private_and_persistent() {
        let first = FnProcessor::new("first", |req: String, ctx: &mut StageContext<String, String>| {
            if ctx.contains(TAG) {
                anyhow::bail!("data leaked from a previous run");
            }
            ctx.put(TAG, format!("seen:{req}"));
            ctx.send_request(req)?;
            Ok(())
        })
        .on_response(|resp, ctx| {
            let tag = ctx
                .get(TAG)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("data lost between callbacks"))?;
            ctx.send_response(resp.map(|item| format!("{item}|{tag}")));
            Ok(())
        });
        let second = FnProcessor::new("second", |req: String, ctx: &mut StageContext<String, String>| {
            if ctx.contains(TAG) {
                anyhow::bail!("data leaked from stage 0");
            }
            ctx.send_item(req);
            ctx.send_eop();
            Ok(())
        });
        let pipeline = Pipeline::builder("private")
            .processor(first)
            .processor(second)
            .build()
            .unwrap();
        let executor = SerialPipelineExecutor::new();

        for _ in 0..2 {
            let (responses, _) = executor
                .collect(&pipeline, "roads".to_string())
                .await
                .unwrap();
            assert_eq!(responses, vec!["roads|seen:roads".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_runs_are_independent() {
        let log = CallLog::new();
        let pipeline = Pipeline::builder("repeat")
            .processor(RecordingProcessor::new(
                PassThroughProcessor::new("pass"),
                log.clone(),
            ))
            .processor(TerminalProcessor::new("answer").with_responses(vec!["r".to_string()]))
            .build()
            .unwrap();
        let executor = SerialPipelineExecutor::new();

        let (first, first_summary) = executor.collect(&pipeline, "q".to_string()).await.unwrap();
        let first_trace = log.trace();
        log.clear();
        let (second, second_summary) = executor.collect(&pipeline, "q".to_string()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first_summary.steps, second_summary.steps);
        assert_eq!(first_trace, log.trace());
        assert_ne!(first_summary.run_id, second_summary.run_id);
        assert!(log.records().iter().all(|r| r.run_id == second_summary.run_id));
    }

    #[tokio::test]
    async fn test_swallowed_request_starves() {
        let pipeline = Pipeline::<String, String>::builder("stall")
            .processor(PassThroughProcessor::new("pass"))
            .processor(SilentProcessor::new("silent"))
            .build()
            .unwrap();

        let result = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await;

        assert_starved(&result);
        match result {
            Err(PipelineError::Starvation { steps, stage_count }) => {
                assert_eq!(steps, 2);
                assert_eq!(stage_count, 2);
            }
            other => panic!("expected starvation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_items_without_eop_starve() {
        let pipeline = Pipeline::builder("no-eop")
            .processor(FnProcessor::new(
                "chatty",
                |req: String, ctx: &mut StageContext<String, String>| {
                    ctx.send_item(req);
                    Ok(())
                },
            ))
            .build()
            .unwrap();
        let mut handler = CollectingHandler::new();

        let result = SerialPipelineExecutor::new()
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await;

        assert_starved(&result);
        assert_eq!(handler.responses(), &["q".to_string()]);
    }

    #[tokio::test]
    async fn test_terminal_send_request_is_boundary_violation() {
        let pipeline = Pipeline::<String, String>::builder("overreach")
            .processor(PassThroughProcessor::new("pass"))
            .processor(OverreachingProcessor::new("sink"))
            .build()
            .unwrap();

        let result = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await;

        assert_error_code(&result, "PIPE-004-BOUNDARY");
        match result {
            Err(PipelineError::BoundaryViolation { stage, processor }) => {
                assert_eq!(stage, 1);
                assert_eq!(processor, "sink");
            }
            other => panic!("expected boundary violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_stage_pass_through_is_boundary_violation() {
        let pipeline = Pipeline::<String, String>::builder("alone")
            .processor(PassThroughProcessor::new("pass"))
            .build()
            .unwrap();

        let result = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await;

        assert_error_code(&result, "PIPE-004-BOUNDARY");
    }

    #[tokio::test]
    async fn test_handler_error_aborts_run() {
        let log = CallLog::new();
        let pipeline = Pipeline::builder("abort")
            .processor(RecordingProcessor::new(
                PassThroughProcessor::new("pass"),
                log.clone(),
            ))
            .processor(RecordingProcessor::new(
                TerminalProcessor::new("answer").with_responses(vec![
                    "a".to_string(),
                    "b".to_string(),
                    "c".to_string(),
                ]),
                log.clone(),
            ))
            .build()
            .unwrap();
        let mut handler = FailingHandler::after(1, "disk full");

        let result = SerialPipelineExecutor::new()
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await;

        assert_error_code(&result, "PIPE-003-HANDLER");
        assert!(result.unwrap_err().to_string().contains("disk full"));
        assert_eq!(handler.received(), &["a".to_string()]);
        assert_eq!(
            log.trace(),
            vec![
                (0, MessageKind::Request),
                (1, MessageKind::Request),
                (0, MessageKind::Response),
                (0, MessageKind::Response),
            ]
        );
    }

    #[tokio::test]
    async fn test_handler_error_drops_rest_of_callback_output() {
        let pipeline = Pipeline::builder("burst")
            .processor(TerminalProcessor::new("answer").with_responses(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
            ]))
            .build()
            .unwrap();
        let mut handler = FailingHandler::after(1, "stop");

        let result = SerialPipelineExecutor::new()
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await;

        assert_error_code(&result, "PIPE-003-HANDLER");
        assert_eq!(handler.received(), &["a".to_string()]);
    }

    #[tokio::test]
    async fn test_processor_error_on_request() {
        let pipeline = Pipeline::<String, String>::builder("fail")
            .processor(PassThroughProcessor::new("pass"))
            .processor(FailingProcessor::on_request("tiles", "bad tile"))
            .build()
            .unwrap();

        let result = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await;

        match result {
            Err(err @ PipelineError::Processor { .. }) => {
                assert_eq!(err.stage(), Some(1));
                let dict = err.to_dict();
                assert_eq!(dict["processor"], "tiles");
                assert_eq!(dict["kind"], "request");
                assert!(err.to_string().contains("bad tile"));
            }
            other => panic!("expected processor error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_processor_error_on_response() {
        let pipeline = Pipeline::<String, String>::builder("fail-late")
            .processor(FailingProcessor::on_response("render", "boom"))
            .processor(TerminalProcessor::new("answer"))
            .build()
            .unwrap();

        let result = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await;

        match result {
            Err(PipelineError::Processor {
                stage,
                kind,
                processor,
                ..
            }) => {
                assert_eq!(stage, 0);
                assert_eq!(kind, MessageKind::Response);
                assert_eq!(processor, "render");
            }
            other => panic!("expected processor error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_step_limit() {
        let pipeline = forwarding_chain(3, &[]);

        let limited = SerialPipelineExecutor::new()
            .with_config(ExecutorConfig::new().with_max_steps(3));
        let result = limited.collect(&pipeline, "q".to_string()).await;
        assert!(matches!(
            result,
            Err(PipelineError::StepLimitExceeded { limit: 3 })
        ));

        let exact = SerialPipelineExecutor::new()
            .with_config(ExecutorConfig::new().with_max_steps(5));
        let (_, summary) = exact.collect(&pipeline, "q".to_string()).await.unwrap();
        assert_steps(&summary, 5);
    }

    #[tokio::test]
    async fn test_starvation_reported_before_step_limit() {
        let pipeline = Pipeline::<String, String>::builder("stall")
            .processor(PassThroughProcessor::new("pass"))
            .processor(SilentProcessor::new("silent"))
            .build()
            .unwrap();
        let executor = SerialPipelineExecutor::new()
            .with_config(ExecutorConfig::new().with_max_steps(2));

        let result = executor.collect(&pipeline, "q".to_string()).await;
        assert_starved(&result);
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = SerialPipelineExecutor::new().with_event_sink(sink.clone());

        let pipeline = forwarding_chain(2, &["a"]);
        executor.collect(&pipeline, "q".to_string()).await.unwrap();
        assert_eq!(
            sink.event_types(),
            vec![PIPELINE_STARTED.to_string(), PIPELINE_COMPLETED.to_string()]
        );

        let started = &sink.events_of_type(PIPELINE_STARTED)[0];
        let data = started.1.as_ref().unwrap();
        assert_eq!(data["pipeline_name"], "chain-2");
        assert_eq!(data["map_id"], "map-test");
        assert_eq!(data["service_id"], "wms-test");

        let completed = &sink.events_of_type(PIPELINE_COMPLETED)[0];
        assert_eq!(completed.1.as_ref().unwrap()["steps"], 4);

        sink.clear();
        let stalled = Pipeline::<String, String>::builder("stall")
            .processor(SilentProcessor::new("silent"))
            .build()
            .unwrap();
        let _ = executor.collect(&stalled, "q".to_string()).await;
        assert_eq!(
            sink.event_types(),
            vec![PIPELINE_STARTED.to_string(), PIPELINE_FAILED.to_string()]
        );
        let failed = &sink.events_of_type(PIPELINE_FAILED)[0];
        assert_eq!(failed.1.as_ref().unwrap()["code"], "PIPE-001-STARVATION");
    }

    #[tokio::test]
    async fn test_events_disabled() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = SerialPipelineExecutor::new()
            .with_config(ExecutorConfig::new().with_events(false))
            .with_event_sink(sink.clone());

        executor
            .collect(&forwarding_chain(2, &[]), "q".to_string())
            .await
            .unwrap();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_executor_as_trait_object() {
        let executor: Box<dyn PipelineExecutor<String, String>> =
            Box::new(SerialPipelineExecutor::new());
        let pipeline = forwarding_chain(2, &["tile"]);
        let mut handler = CollectingHandler::new();

        let summary = executor
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.into_responses(), vec!["tile".to_string()]);
        assert_steps(&summary, 4);
    }

    #[tokio::test]
    async fn test_mock_handler_receives_in_order() {
        let mut handler = MockHandler::new();
        let mut seq = Sequence::new();
        for expected in ["a", "b"] {
            handler
                .expect_handle()
                .withf(move |r: &String| r == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let pipeline = forwarding_chain(3, &["a", "b"]);
        let summary = SerialPipelineExecutor::new()
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await
            .unwrap();

        assert_eq!(summary.responses_delivered, 2);
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let pipeline = forwarding_chain(2, &["a", "b", "c"]);
        let mut total = 0_usize;
        let mut handler = |r: String| -> anyhow::Result<()> {
            total += r.len();
            Ok(())
        };

        SerialPipelineExecutor::new()
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await
            .unwrap();

        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_async_processors() {
        let pipeline = Pipeline::builder("slow")
            .processor(DelayedForwarder {
                name: "a".to_string(),
                delay: Duration::from_millis(5),
            })
            .processor(DelayedForwarder {
                name: "b".to_string(),
                delay: Duration::from_millis(5),
            })
            .processor(FnProcessor::new(
                "echo",
                |req: String, ctx: &mut StageContext<String, String>| {
                    ctx.send_item(req);
                    ctx.send_eop();
                    Ok(())
                },
            ))
            .build()
            .unwrap();

        let (responses, summary) = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await
            .unwrap();

        assert_eq!(responses, vec!["q+a+b".to_string()]);
        assert!(summary.duration_ms >= 10.0);
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_pipeline() {
        let pipeline = Arc::new(forwarding_chain(4, &["x", "y"]));
        let executor = SerialPipelineExecutor::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = Arc::clone(&pipeline);
                let executor = executor.clone();
                tokio::spawn(async move {
                    executor
                        .collect(pipeline.as_ref(), format!("request-{i}"))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let (responses, summary) = handle.await.unwrap().unwrap();
            assert_eq!(responses, vec!["x".to_string(), "y".to_string()]);
            assert_steps(&summary, 13);
        }
    }

    #[test]
    fn test_blocking_execution() {
        let pipeline = forwarding_chain(2, &["a"]);
        let result = tokio_test::block_on(
            SerialPipelineExecutor::default().collect(&pipeline, "q".to_string()),
        );
        let (responses, summary) = result.unwrap();
        assert_eq!(responses, vec!["a".to_string()]);
        assert_eq!(summary.stage_count, 2);
    }

    #[tokio::test]
    async fn test_stage_zero_item_delivered_before_failure() {
        let pipeline = Pipeline::builder("late-failure")
            .processor(FnProcessor::new(
                "render",
                |req: String, ctx: &mut StageContext<String, String>| {
                    ctx.send_item(req);
                    anyhow::bail!("late failure")
                },
            ))
            .build()
            .unwrap();
        let mut handler = CollectingHandler::new();

        let result = SerialPipelineExecutor::new()
            .execute(&pipeline, "tile".to_string(), &mut handler)
            .await;

        assert_error_code(&result, "PIPE-002-PROCESSOR");
        assert_eq!(handler.responses(), &["tile".to_string()]);
    }

    #[tokio::test]
    async fn test_stage_zero_items_stream_while_callback_awaits() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder("stream")
            .processor(StreamingProcessor {
                delivered: Arc::clone(&delivered),
            })
            .build()
            .unwrap();
        let log = Arc::clone(&delivered);
        let mut handler = move |r: String| -> anyhow::Result<()> {
            log.lock().push(r);
            Ok(())
        };

        let summary = SerialPipelineExecutor::new()
            .execute(&pipeline, "q".to_string(), &mut handler)
            .await
            .unwrap();

        assert_eq!(*delivered.lock(), vec!["q-1".to_string(), "q-2".to_string()]);
        assert_eq!(summary.responses_delivered, 2);
        assert_steps(&summary, 1);
    }

    #[tokio::test]
    async fn test_items_after_eop_in_same_callback_are_delivered() {
        let pipeline = Pipeline::builder("after-eop")
            .processor(FnProcessor::new(
                "answer",
                |req: String, ctx: &mut StageContext<String, String>| {
                    ctx.send_eop();
                    ctx.send_item(format!("{req}-late"));
                    Ok(())
                },
            ))
            .build()
            .unwrap();

        let (responses, summary) = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await
            .unwrap();

        assert_eq!(responses, vec!["q-late".to_string()]);
        assert_eq!(summary.responses_delivered, 1);
        assert_steps(&summary, 1);
    }

    #[tokio::test]
    async fn test_termination_drops_queued_work() {
        let log = CallLog::new();
        let pipeline = Pipeline::builder("early-exit")
            .processor(FnProcessor::new(
                "fanout",
                |req: String, ctx: &mut StageContext<String, String>| {
                    ctx.send_request(format!("{req}-a"))?;
                    ctx.send_request(format!("{req}-b"))?;
                    Ok(())
                },
            ))
            .processor(RecordingProcessor::new(
                TerminalProcessor::new("answer").with_responses(vec!["x".to_string()]),
                log.clone(),
            ))
            .build()
            .unwrap();

        let (responses, summary) = SerialPipelineExecutor::new()
            .collect(&pipeline, "q".to_string())
            .await
            .unwrap();

        // The first end-of-pipe reaches the caller while "q-b" is still
        // queued at stage 1.
        assert_eq!(responses, vec!["x".to_string()]);
        assert_eq!(log.trace(), vec![(1, MessageKind::Request)]);
        assert_eq!(summary.requests_processed, 2);
        assert_steps(&summary, 4);
    }
}
