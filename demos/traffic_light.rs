//! Example: a traffic light driven by concurrent tasks.

use tokio_machine::{Definition, Rule, StateMachine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let definition = Definition::builder()
        .initial("green")
        .rule(Rule::on("slow").from("green").to("yellow"))
        .rule(Rule::on("stop").from("yellow").to("red"))
        .rule(Rule::on("ready").from("red").to("yellow"))
        .rule(Rule::on("go").from("yellow").to("green"))
        .rule(Rule::on("power_failure").to("red"))
        .before("go", |ctx| {
            if ctx
                .args()
                .iter()
                .any(|arg| arg["pedestrians"].as_bool().unwrap_or(false))
            {
                ctx.cancel();
            }
            Ok(())
        })
        .on_enter("red", |_| {
            println!("all traffic halted");
            Ok(())
        })
        .on_transition(|ctx| {
            println!("{} -> {} ({})", ctx.from(), ctx.to(), ctx.event());
            Ok(())
        })
        .build()?;

    let (light, task) = StateMachine::spawn(definition)?;

    light.fire("slow").await?;
    light.fire("stop").await?;
    light.fire("ready").await?;

    // A crossing guard holds the light: the transition is vetoed.
    let outcome = light
        .fire_with("go", vec![serde_json::json!({"pedestrians": true})])
        .await?;
    println!("go with pedestrians: {outcome:?}");

    light.fire("go").await?;

    // Power failure applies from any state.
    light.fire_async("power_failure").await?;
    light.wait_for_state("red").await?;

    light.terminate();
    let final_state = task.await?;
    println!("light wound down at {final_state}");
    Ok(())
}
