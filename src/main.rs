//! Headless arena runner.

use petri::{Config, SimMode, Simulation};
use tokio::time::{interval, Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tick period for a rate in Hz. Rates above 1000 floor to a 1 ms
/// period; a zero-period interval panics.
fn tick_period(tick_rate: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(tick_rate.max(1))).max(1))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Arena v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Loaded configuration");
    info!("  World: {}x{}", config.world.width, config.world.height);
    info!("  Tick rate: {}", config.world.tick_rate);
    info!("  Bots: {}", config.bot.count);

    let tick_rate = config.world.tick_rate.max(1);
    let food_target = config.food.max_amount;
    let virus_target = config.virus.max_amount;

    let mut sim = Simulation::new(config, SimMode::Standalone);
    for _ in 0..food_target {
        sim.spawn_food(None, None);
    }
    for _ in 0..virus_target {
        sim.spawn_virus(None, None);
    }
    sim.spawn_bots();
    info!(
        food = sim.world.food.len(),
        viruses = sim.world.viruses.len(),
        bots = sim.bots.len(),
        "arena seeded"
    );

    let mut ticker = interval(tick_period(tick_rate));
    loop {
        ticker.tick().await;
        sim.step();
        // Standalone mode has no store session; drain so events never pile up.
        sim.take_outbound();

        if sim.tick % (tick_rate as u64 * 10) == 0 {
            for (rank, (name, mass)) in sim.world.leaderboard().iter().take(3).enumerate() {
                info!(rank = rank + 1, %name, mass = *mass as u64, "leaderboard");
            }
        }
    }
}
