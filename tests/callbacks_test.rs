use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio_machine::{CallbackError, Definition, FireOutcome, Rule, StateMachine};

#[tokio::test]
async fn hooks_fire_specific_before_generic_around_each_transition() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let push = |label: &'static str| {
        let log = Arc::clone(&log);
        move |_: &mut tokio_machine::TransitionContext| {
            log.lock().unwrap().push(label.to_string());
            Ok(())
        }
    };

    let definition = Definition::builder()
        .rule(Rule::on("slow").from("green").to("yellow"))
        .before("slow", push("before_slow"))
        .before_any(push("before_any"))
        .on_exit("green", push("exit_green"))
        .on_exit_any(push("exit_any"))
        .on_transition(push("on_transition"))
        .on_event("slow", push("on_slow"))
        .on_enter("yellow", push("enter_yellow"))
        .on_enter_any(push("enter_any"))
        .after("slow", push("after_slow"))
        .after_any(push("after_any"))
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "green").unwrap();
    machine.fire("slow").await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before_slow",
            "before_any",
            "exit_green",
            "exit_any",
            "on_transition",
            "on_slow",
            "enter_yellow",
            "enter_any",
            "after_slow",
            "after_any",
        ]
    );
}

#[tokio::test]
async fn a_before_hook_can_cancel_the_transition() {
    let later_hooks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later_hooks);

    let definition = Definition::builder()
        .rule(Rule::on("slow").from("green").to("yellow"))
        .before("slow", |ctx| {
            ctx.cancel();
            Ok(())
        })
        .on_exit_any({
            let counter = Arc::clone(&counter);
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .after_any(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "green").unwrap();
    let outcome = machine.fire("slow").await.unwrap();

    assert_eq!(outcome, FireOutcome::Cancelled);
    assert_eq!(machine.current_state(), "green");
    assert_eq!(later_hooks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_failing_observer_reports_failure_but_the_commit_stands() {
    let definition = Definition::builder()
        .rule(Rule::on("slow").from("green").to("yellow"))
        .on_enter("yellow", |_| Err(CallbackError::new("sensor offline")))
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "green").unwrap();
    let outcome = machine.fire("slow").await.unwrap();

    assert_eq!(
        outcome,
        FireOutcome::Failed(CallbackError::new("sensor offline"))
    );
    assert_eq!(machine.current_state(), "yellow");
}

#[tokio::test]
async fn a_failure_during_async_fire_does_not_wedge_the_machine() {
    let definition = Definition::builder()
        .rule(Rule::on("slow").from("green").to("yellow"))
        .rule(Rule::on("go").from("yellow").to("green"))
        .on_enter("yellow", |_| Err(CallbackError::new("boom")))
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "green").unwrap();

    // No caller waits on this outcome; the failure is only logged.
    machine.fire_async("slow").await.unwrap();
    machine.wait_for_state("yellow").await.unwrap();

    let outcome = machine.fire("go").await.unwrap();
    assert!(outcome.is_succeeded());
}

#[tokio::test]
async fn re_entrant_transitions_run_exit_and_enter_once_each() {
    let exits = Arc::new(AtomicUsize::new(0));
    let enters = Arc::new(AtomicUsize::new(0));

    let definition = Definition::builder()
        .rule(Rule::on("refresh").from("ready").to("ready"))
        .on_exit("ready", {
            let exits = Arc::clone(&exits);
            move |_| {
                exits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .on_enter("ready", {
            let enters = Arc::clone(&enters);
            move |_| {
                enters.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "ready").unwrap();
    let outcome = machine.fire("refresh").await.unwrap();

    assert!(outcome.is_succeeded());
    assert_eq!(machine.current_state(), "ready");
    assert_eq!(exits.load(Ordering::SeqCst), 1);
    assert_eq!(enters.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fire_args_reach_every_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let definition = Definition::builder()
        .rule(Rule::on("deliver").from("packed").to("shipped"))
        .on_event("deliver", move |ctx| {
            sink.lock().unwrap().extend(ctx.args().to_vec());
            Ok(())
        })
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "packed").unwrap();
    machine
        .fire_with("deliver", vec![json!({"address": "12 Main St"})])
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!({"address": "12 Main St"})]);
}

#[tokio::test]
async fn handlers_with_the_same_key_run_in_registration_order() {
    let log: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&log);
    let second = Arc::clone(&log);

    let definition = Definition::builder()
        .rule(Rule::on("slow").from("green").to("yellow"))
        .before("slow", move |_| {
            first.lock().unwrap().push(1);
            Ok(())
        })
        .before("slow", move |_| {
            second.lock().unwrap().push(2);
            Ok(())
        })
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "green").unwrap();
    machine.fire("slow").await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn wildcard_hooks_observe_transitions_from_wildcard_rules() {
    let entered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&entered);

    let definition = Definition::builder()
        .rule(Rule::on("advance").from("draft").to("review"))
        .rule(Rule::on("panic").to("failed"))
        .on_enter_any(move |ctx| {
            sink.lock().unwrap().push(ctx.to().to_string());
            Ok(())
        })
        .build()
        .unwrap();

    let (machine, _task) = StateMachine::spawn_at(definition, "draft").unwrap();
    machine.fire("advance").await.unwrap();
    machine.fire("panic").await.unwrap();

    assert_eq!(*entered.lock().unwrap(), vec!["review", "failed"]);
}
