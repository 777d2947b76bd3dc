use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bootvisor::{
    Boot, BootConfig, EventBus, EventBusConfig, EventKey, Phase, RunContext, Unit, UnitError,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let bus = EventBus::new(EventBusConfig::default());
    bus.subscribe::<String, _>(&EventKey::new("ready"), |msg| {
        println!("event: {msg}");
        Ok(())
    })?;

    let mut boot = Boot::builder(BootConfig {
        banner: true,
        ..BootConfig::default()
    })
    .with_sink(|line: &str| println!("{line}"))
    .with_events(Arc::clone(&bus))
    .build();
    boot.boot_timeout(Duration::from_secs(30));

    let attempts = Arc::new(AtomicU32::new(0));
    let worker = {
        let attempts = Arc::clone(&attempts);
        Unit::new("worker", Phase::Daemon, move |ctx: RunContext| {
            let attempts = Arc::clone(&attempts);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.printf(format_args!("worker attempt #{n}"));
                if n < 2 {
                    return Err(UnitError::fail("queue not reachable"));
                }
                Ok(())
            }
        })
    };

    boot.register([
        Unit::new("normal_1", Phase::Normal, |ctx: RunContext| async move {
            ctx.print("normal_1");
            ctx.print("normal_1 done");
            Ok(())
        })
        .timeout(Duration::from_millis(500)),
        Unit::new("normal_2", Phase::Normal, |ctx: RunContext| async move {
            ctx.print("normal_2");
            tokio::time::sleep(Duration::from_secs(1)).await;
            ctx.require(ctx.scope(), "normal_1").await?;
            ctx.print("normal_2 done");
            Ok(())
        }),
        Unit::new("background", Phase::Background, |ctx: RunContext| async move {
            ctx.print("background");
            tokio::time::sleep(Duration::from_secs(3)).await;
            ctx.print("background done");
            Ok(())
        }),
        worker,
        Unit::new("after_1", Phase::After, |ctx: RunContext| async move {
            ctx.print("after_1");
            tokio::time::sleep(Duration::from_millis(500)).await;
            ctx.print("after_1 done");
            Ok(())
        }),
        Unit::new("after_2", Phase::After, |ctx: RunContext| async move {
            ctx.print("after_2");
            if let Some(events) = ctx.events() {
                events.publish_queue(&EventKey::new("ready"), String::from("application ready"));
            }
            Ok(())
        }),
        Unit::new("front", Phase::Front, |ctx: RunContext| async move {
            ctx.print("front");
            ctx.store().set("started_by", String::from("demo"));
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }),
    ])?;

    match boot.start().await {
        Ok(report) => {
            for unit in &report.units {
                println!(
                    "{:<10} {:<10} {:?} restarts={}",
                    unit.name, unit.phase, unit.status, unit.restarts
                );
            }
            println!("boot finished in {:?}", report.elapsed);
        }
        Err(err) if err.is_fatal() => {
            eprintln!("boot failed: {err}");
            std::process::exit(1);
        }
        Err(err) => eprintln!("{err}"),
    }

    bus.flush().await;
    bus.shutdown().await;
    Ok(())
}
