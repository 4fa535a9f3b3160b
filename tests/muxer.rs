//! Muxer ordering, clock validation and seeking tests

mod common;

use common::builders::{event_stream, SequenceBuilder, StreamBuilder};
use common::{attach_handle, connect, event_times, mux_graph, mux_graph_with, IteratorHandle};
use serde_json::json;
use std::rc::Rc;
use tracegraph_rs::pipeline::nodes::memory_source::{self, SeekSwitch};
use tracegraph_rs::pipeline::nodes::{muxer, Collected};
use tracegraph_rs::pipeline::{
    ClockClass, Graph, GraphError, GraphState, Message, MessageBody, MessageKind, Params, Pull,
    RunStatus, SeekStatus,
};

fn drain(handle: &IteratorHandle) -> Vec<Message> {
    let mut messages = Vec::new();
    loop {
        match handle.with(|it| it.next()).unwrap() {
            Pull::Messages(batch) => messages.extend(batch),
            Pull::Again => continue,
            Pull::End => return messages,
        }
    }
}

fn event_class_ids(collected: &Collected) -> Vec<u64> {
    collected.with(|messages| {
        messages
            .iter()
            .filter_map(|m| match m.body() {
                MessageBody::Event { event, .. } => Some(event.class.id),
                _ => None,
            })
            .collect()
    })
}

fn run_to_end(graph: &mut Graph) {
    loop {
        match graph.run().unwrap() {
            RunStatus::End => return,
            RunStatus::Again | RunStatus::Ok => continue,
            RunStatus::Interrupted => panic!("unexpected interruption"),
        }
    }
}

#[test]
fn test_merges_by_time() {
    let (mut graph, collected) =
        mux_graph(vec![event_stream(0, &[0, 10, 20]), event_stream(1, &[5, 15, 25])]).unwrap();

    assert_eq!(graph.run().unwrap(), RunStatus::End);
    assert_eq!(event_times(&collected), vec![0, 5, 10, 15, 20, 25]);
    assert_eq!(
        collected.timestamps(),
        [0, 0, 5, 5, 10, 15, 20, 20, 25, 25]
            .into_iter()
            .map(Some)
            .collect::<Vec<_>>()
    );
    assert_eq!(
        collected.kinds()[..4],
        [
            MessageKind::StreamBeginning,
            MessageKind::Event,
            MessageKind::StreamBeginning,
            MessageKind::Event,
        ]
    );
}

#[test]
fn test_equal_times_order_by_event_class() {
    // Identical streams, so only the event class can break the tie.
    let sequence = |class_id| {
        SequenceBuilder::new(StreamBuilder::new(0).build())
            .begin(Some(0))
            .event(class_id, 10)
            .end(Some(20))
            .build()
    };

    for _ in 0..5 {
        let (mut graph, collected) = mux_graph(vec![sequence(7), sequence(3)]).unwrap();
        assert_eq!(graph.run().unwrap(), RunStatus::End);
        assert_eq!(event_class_ids(&collected), vec![3, 7]);

        let (mut graph, collected) = mux_graph(vec![sequence(3), sequence(7)]).unwrap();
        assert_eq!(graph.run().unwrap(), RunStatus::End);
        assert_eq!(event_class_ids(&collected), vec![3, 7]);
    }
}

#[test]
fn test_equal_times_order_by_stream() {
    let trace_a = StreamBuilder::new(4).trace_name("alpha").build();
    let trace_b = StreamBuilder::new(1).trace_name("beta").build();
    let sequence = |stream| {
        SequenceBuilder::new(stream)
            .begin(Some(0))
            .event(0, 10)
            .end(Some(20))
            .build()
    };

    let (mut graph, collected) =
        mux_graph(vec![sequence(trace_b), sequence(trace_a)]).unwrap();
    assert_eq!(graph.run().unwrap(), RunStatus::End);

    let stream_ids: Vec<u64> = collected.with(|messages| {
        messages
            .iter()
            .filter(|m| m.kind() == MessageKind::Event)
            .filter_map(|m| m.stream().map(|s| s.id))
            .collect()
    });
    // Trace name first, so "alpha" (stream 4) wins over "beta" (stream 1).
    assert_eq!(stream_ids, vec![4, 1]);
}

#[test]
fn test_incompatible_clock_classes() {
    let absolute = StreamBuilder::new(0).build();
    let local = StreamBuilder::new(1)
        .clock(Rc::new(ClockClass::new().with_unix_epoch_origin(false)))
        .build();
    let (mut graph, collected) = mux_graph(vec![
        SequenceBuilder::new(absolute).begin(Some(0)).end(Some(1)).build(),
        SequenceBuilder::new(local).begin(Some(0)).end(Some(1)).build(),
    ])
    .unwrap();

    let err = graph.run().unwrap_err();
    assert!(matches!(err.root_cause(), GraphError::ClockClass(_)));
    assert!(err
        .causes()
        .iter()
        .any(|cause| cause.contains("incompatible clock class")));
    assert_eq!(graph.state(), GraphState::Faulty);
    assert!(collected.is_empty());
}

#[test]
fn test_shared_uuid_clocks_are_compatible() {
    let uuid = uuid::Uuid::from_u128(0x5eed);
    let clock = || Rc::new(ClockClass::new().with_unix_epoch_origin(false).with_uuid(uuid));
    let a = StreamBuilder::new(0).clock(clock()).build();
    let b = StreamBuilder::new(1).clock(clock()).build();

    let (mut graph, collected) = mux_graph(vec![
        SequenceBuilder::new(a).begin(Some(0)).event(0, 4).end(Some(8)).build(),
        SequenceBuilder::new(b).begin(Some(2)).event(0, 6).end(Some(9)).build(),
    ])
    .unwrap();

    assert_eq!(graph.run().unwrap(), RunStatus::End);
    assert_eq!(event_times(&collected), vec![4, 6]);
}

#[test]
fn test_stream_end_without_time_follows_last_message() {
    let a = StreamBuilder::new(0).build();
    let b = StreamBuilder::new(1).build();
    let (mut graph, collected) = mux_graph(vec![
        SequenceBuilder::new(a).begin(Some(0)).event(0, 10).end(None).build(),
        SequenceBuilder::new(b).begin(Some(5)).event(0, 20).end(Some(30)).build(),
    ])
    .unwrap();

    assert_eq!(graph.run().unwrap(), RunStatus::End);
    assert_eq!(
        collected.timestamps(),
        vec![Some(0), Some(5), Some(10), None, Some(20), Some(30)]
    );
    let ended = collected.with(|messages| messages[3].stream().map(|s| s.id));
    assert_eq!(ended, Some(0));
}

#[test]
fn test_error_after_partial_batch_is_reported_next() {
    let failing = SequenceBuilder::new(StreamBuilder::new(0).build())
        .begin(Some(0))
        .events(0, &[0, 10, 20])
        .build();
    let healthy = SequenceBuilder::new(StreamBuilder::new(1).build())
        .begin(Some(5))
        .events(0, &[5, 15])
        .end(Some(15))
        .build();
    let (mut graph, collected) = mux_graph_with(
        Graph::new(),
        vec![
            (failing, Params::from(json!({ "fail-at": 3 }))),
            (healthy, Params::empty()),
        ],
    )
    .unwrap();

    assert_eq!(graph.run_once().unwrap(), RunStatus::Ok);
    assert_eq!(
        collected.timestamps(),
        vec![Some(0), Some(0), Some(5), Some(5), Some(10)]
    );

    let err = graph.run_once().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        GraphError::Callback(msg) if msg == "memory source failed at message 3"
    ));
    assert_eq!(graph.state(), GraphState::Faulty);
    assert_eq!(collected.len(), 5);
}

#[test]
fn test_again_is_propagated() {
    let (mut graph, collected) = mux_graph_with(
        Graph::new(),
        vec![
            (event_stream(0, &[1, 3, 5]), Params::from(json!({ "again-every": 2 }))),
            (event_stream(1, &[2, 4, 6]), Params::empty()),
        ],
    )
    .unwrap();

    run_to_end(&mut graph);
    assert_eq!(event_times(&collected), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_without_upstreams_ends_immediately() {
    let mut graph = Graph::new();
    let mux = graph.add_component(&muxer::class(), "mux", Params::empty()).unwrap();
    let handle = attach_handle(&mut graph, mux).unwrap();

    assert!(matches!(handle.with(|it| it.next()).unwrap(), Pull::End));
}

#[test]
fn test_seek_beginning_requires_every_upstream() {
    let first = SeekSwitch::default();
    let second = SeekSwitch::default();

    let mut graph = Graph::new();
    let mux = graph.add_component(&muxer::class(), "mux", Params::empty()).unwrap();
    for (i, (values, switch)) in [(&[0u64, 10][..], &first), (&[5, 15, 25][..], &second)]
        .into_iter()
        .enumerate()
    {
        let class = memory_source::class_with_switch(event_stream(i as u64, values), switch.clone());
        let src = graph
            .add_component(&class, &format!("src{}", i), Params::empty())
            .unwrap();
        connect(&mut graph, src, "out", mux, &format!("in{}", i)).unwrap();
    }
    let handle = attach_handle(&mut graph, mux).unwrap();

    assert!(handle.with(|it| it.can_seek_beginning()).unwrap());
    second.set(false);
    assert!(!handle.with(|it| it.can_seek_beginning()).unwrap());
    second.set(true);

    let first_pass = drain(&handle);
    assert_eq!(first_pass.len(), 9);

    // Upstreams that already ended still count.
    first.set(false);
    assert!(!handle.with(|it| it.can_seek_beginning()).unwrap());
    first.set(true);

    assert_eq!(handle.with(|it| it.seek_beginning()).unwrap(), SeekStatus::Ok);
    let second_pass = drain(&handle);
    let describe = |messages: &[Message]| -> Vec<(MessageKind, Option<i64>)> {
        messages
            .iter()
            .map(|m| (m.kind(), m.ns_from_origin().unwrap()))
            .collect()
    };
    assert_eq!(describe(&first_pass), describe(&second_pass));
}

#[test]
fn test_seek_to_time_across_upstreams() {
    let mut graph = Graph::new();
    let mux = common::add_muxed_sources(
        &mut graph,
        vec![
            (event_stream(0, &[0, 10, 20]), Params::empty()),
            (event_stream(1, &[5, 15, 25]), Params::empty()),
        ],
    )
    .unwrap();
    let handle = attach_handle(&mut graph, mux).unwrap();

    assert!(handle.with(|it| it.can_seek_forward()));
    assert_eq!(handle.with(|it| it.seek_ns_from_origin(12)).unwrap(), SeekStatus::Ok);

    let messages = drain(&handle);
    let kinds: Vec<MessageKind> = messages.iter().map(Message::kind).collect();
    assert_eq!(
        kinds[..2],
        [MessageKind::StreamBeginning, MessageKind::StreamBeginning]
    );
    let events: Vec<i64> = messages
        .iter()
        .filter(|m| m.kind() == MessageKind::Event)
        .filter_map(|m| m.ns_from_origin().unwrap())
        .collect();
    assert_eq!(events, vec![15, 20, 25]);
}

#[test]
fn test_unresolved_ties_follow_port_order() {
    // Equal in every compared field; only the `Rc` identity differs.
    let low = StreamBuilder::new(0).build();
    let high = StreamBuilder::new(0).build();
    let longer = SequenceBuilder::new(Rc::clone(&low))
        .begin(Some(0))
        .events(0, &[10, 30])
        .end(Some(40))
        .build();
    let shorter = SequenceBuilder::new(Rc::clone(&high))
        .begin(Some(0))
        .event(0, 10)
        .end(Some(20))
        .build();

    let mut graph = Graph::new();
    let mux = common::add_muxed_sources(
        &mut graph,
        vec![(longer, Params::empty()), (shorter, Params::empty())],
    )
    .unwrap();
    let handle = attach_handle(&mut graph, mux).unwrap();

    let origin = |messages: &[Message]| -> Vec<(u8, MessageKind)> {
        messages
            .iter()
            .map(|m| {
                let from_low = m.stream().is_some_and(|s| Rc::ptr_eq(s, &low));
                (if from_low { 0 } else { 1 }, m.kind())
            })
            .collect()
    };
    let expected = vec![
        (0, MessageKind::StreamBeginning),
        (1, MessageKind::StreamBeginning),
        (0, MessageKind::Event),
        (1, MessageKind::Event),
        (1, MessageKind::StreamEnd),
        (0, MessageKind::Event),
        (0, MessageKind::StreamEnd),
    ];
    assert_eq!(origin(&drain(&handle)), expected);

    // `in1` ended first; reviving both keeps `in0` ahead on ties.
    assert_eq!(handle.with(|it| it.seek_beginning()).unwrap(), SeekStatus::Ok);
    assert_eq!(origin(&drain(&handle)), expected);
}

#[cfg(not(debug_assertions))]
#[test]
fn test_time_going_backwards_is_rejected() {
    let (mut graph, collected) = mux_graph(vec![event_stream(0, &[20, 10])]).unwrap();

    let err = graph.run().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        GraphError::NonMonotonic { last: 20, current: 10 }
    ));
    assert!(err
        .causes()
        .iter()
        .any(|cause| cause.contains("going back in time on port in0")));
    assert_eq!(graph.state(), GraphState::Faulty);
    assert_eq!(collected.timestamps(), vec![Some(20), Some(20)]);
}

// Debug builds catch the same input earlier, in the source's iterator.
#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "went back in time")]
fn test_time_going_backwards_is_rejected() {
    let (mut graph, _collected) = mux_graph(vec![event_stream(0, &[20, 10])]).unwrap();
    let _ = graph.run();
}
