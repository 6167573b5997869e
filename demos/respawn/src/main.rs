use std::collections::HashMap;

use kairo::prelude::*;
use kairo::LoopSummary;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

const THINK: MessageId = MessageId(1);
const RESPAWN: MessageId = MessageId(2);

struct Monster {
    name: &'static str,
    alive: bool,
    think_ms: u64,
    respawn_ms: u64,
    thoughts: u32,
}

/// A handful of monsters that think periodically, die every third thought,
/// and come back after their respawn delay. The round ends at `kill_limit`.
struct Arena {
    monsters: HashMap<ObjectId, Monster>,
    kills: u32,
    kill_limit: u32,
}

impl Arena {
    fn new(kill_limit: u32) -> Self {
        let roster = [
            (ObjectId(1), "goblin", 250, 1_000),
            (ObjectId(2), "troll", 700, 3_000),
            (ObjectId(3), "wisp", 100, 500),
        ];
        let monsters = roster
            .into_iter()
            .map(|(id, name, think_ms, respawn_ms)| {
                let monster = Monster {
                    name,
                    alive: true,
                    think_ms,
                    respawn_ms,
                    thoughts: 0,
                };
                (id, monster)
            })
            .collect();
        Self {
            monsters,
            kills: 0,
            kill_limit,
        }
    }

    /// Every monster's first think delay, by object id.
    fn openers(&self) -> Vec<(ObjectId, u64)> {
        let mut openers: Vec<_> = self
            .monsters
            .iter()
            .map(|(id, monster)| (*id, monster.think_ms))
            .collect();
        openers.sort();
        openers
    }
}

impl Dispatcher for Arena {
    fn deliver(&mut self, timers: &mut Timers, fired: &FiredTimer) -> Result<(), DispatchError> {
        let monster = self
            .monsters
            .get_mut(&fired.object_id)
            .ok_or(DispatchError::UnknownObject(fired.object_id))?;

        match fired.message_id {
            THINK if !monster.alive => Ok(()),
            THINK => {
                monster.thoughts += 1;
                if monster.thoughts % 3 != 0 {
                    timers.rearm_current(monster.think_ms)?;
                    return Ok(());
                }
                monster.alive = false;
                self.kills += 1;
                tracing::info!(
                    now_ms = timers.now(),
                    monster = monster.name,
                    kills = self.kills,
                    "monster slain"
                );
                timers.create_timer(fired.object_id, RESPAWN, monster.respawn_ms)?;
                if self.kills >= self.kill_limit {
                    timers.quit_timer_loop();
                }
                Ok(())
            }
            RESPAWN => {
                monster.alive = true;
                tracing::info!(now_ms = timers.now(), monster = monster.name, "monster respawned");
                timers.create_timer(fired.object_id, THINK, monster.think_ms)?;
                Ok(())
            }
            other => Err(DispatchError::Rejected(format!("unexpected message {other}"))),
        }
    }

    fn message_id(&self, name: &str) -> Option<MessageId> {
        match name {
            "Think" => Some(THINK),
            "Respawn" => Some(RESPAWN),
            _ => None,
        }
    }

    fn message_name(&self, message_id: MessageId) -> Option<String> {
        match message_id {
            THINK => Some("Think".into()),
            RESPAWN => Some("Respawn".into()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

async fn play_round(
    config: LoopConfig,
    kill_limit: u32,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(LoopSummary, u32), KairoError> {
    let arena = Arena::new(kill_limit);
    let openers = arena.openers();
    let mut server = ServerLoop::<Arena>::builder().config(config).build(arena);
    for (id, delay) in openers {
        server.scheduler_mut().create_timer(id, THINK, delay)?;
    }

    let summary = server.run_until(shutdown).await;
    Ok((summary, server.scheduler().dispatcher().kills))
}

#[tokio::main]
async fn main() -> Result<(), KairoError> {
    kairo::init_tracing("info");

    let config = match std::env::args().nth(1) {
        Some(path) => LoopConfig::from_json_file(path)?,
        None => LoopConfig::default(),
    };

    tracing::info!("starting respawn arena, ctrl-c to stop early");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let (summary, kills) = play_round(config, 10, shutdown).await?;
    tracing::info!(
        kills,
        ticks = summary.ticks,
        fired = summary.fired,
        now_ms = summary.now_ms,
        "round over"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoopConfig {
        LoopConfig {
            tick: TickConfig {
                initial_jitter_us: 0,
                ..TickConfig::with_rate(20)
            },
            ..LoopConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_ends_at_kill_limit() {
        let (summary, kills) = play_round(config(), 4, std::future::pending())
            .await
            .unwrap();
        assert_eq!(kills, 4);
        assert_eq!(summary.failed, 0);
        assert!(summary.fired >= 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wisp_dies_on_third_think() {
        let (summary, kills) = play_round(config(), 1, std::future::pending())
            .await
            .unwrap();
        // Wisp thinks at 100, 200, 300 and dies on the third.
        assert_eq!(kills, 1);
        assert_eq!(summary.now_ms, 300);
    }

    #[test]
    fn test_think_for_dead_monster_is_dropped() {
        let mut scheduler = Scheduler::new(TimerConfig::default(), Arena::new(10));
        scheduler.dispatcher_mut().monsters.get_mut(&ObjectId(2)).unwrap().alive = false;
        scheduler.create_timer(ObjectId(2), THINK, 10).unwrap();

        let report = scheduler.service_timers(10);
        assert_eq!(report.fired, 1);
        assert_eq!(scheduler.num_active_timers(), 0);
    }

    #[test]
    fn test_unknown_monster_fails_delivery() {
        let mut scheduler = Scheduler::new(TimerConfig::default(), Arena::new(10));
        scheduler.create_timer(ObjectId(42), THINK, 10).unwrap();

        let report = scheduler.service_timers(10);
        assert_eq!(report.failed, 1);
    }
}
