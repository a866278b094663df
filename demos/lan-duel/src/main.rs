//! Headless two-player duel over blastlink.
//!
//! ```text
//! lan-duel host [port]
//! lan-duel join <host-ip> [port]
//! ```
//!
//! Each side walks its player in a square at 60 frames per second, drops
//! a bomb every few seconds, and logs what the other side does.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use blastlink::prelude::*;
use blastlink::protocol::now_millis;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

const FRAME: Duration = Duration::from_millis(16);
const TILE: i32 = 32;
const BOMB_EVERY_FRAMES: u64 = 180;
const MATCH_LENGTH: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "lan-duel", about = "Headless two-player duel over blastlink")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Mode {
    /// Wait for the other player to join.
    Host {
        #[arg(default_value_t = blastlink::DEFAULT_PORT)]
        port: u16,
    },
    /// Join a host by IP.
    Join {
        host_ip: String,
        #[arg(default_value_t = blastlink::DEFAULT_PORT)]
        port: u16,
    },
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

struct Duel {
    me: PlayerId,
    position: (i32, i32),
    frame: u64,
    rival: Option<PlayerState>,
    bombs: HashSet<(i32, i32)>,
    destroyed: HashSet<(i32, i32)>,
}

impl Duel {
    fn new(me: PlayerId) -> Self {
        let start = if me == PlayerId::HOST { (TILE, TILE) } else { (TILE * 9, TILE * 9) };
        Self {
            me,
            position: start,
            frame: 0,
            rival: None,
            bombs: HashSet::new(),
            destroyed: HashSet::new(),
        }
    }

    /// Walks one pixel along a 4-tile square.
    fn step(&mut self) -> PlayerState {
        self.frame += 1;
        let side = (self.frame / (TILE as u64 * 4)) % 4;
        let (dx, dy, facing) = match side {
            0 => (1, 0, Facing::Right),
            1 => (0, 1, Facing::Down),
            2 => (-1, 0, Facing::Left),
            _ => (0, -1, Facing::Up),
        };
        self.position.0 += dx;
        self.position.1 += dy;

        PlayerState {
            x: self.position.0,
            y: self.position.1,
            facing,
            anim_frame: (self.frame / 8 % 4) as u32,
            life: 3,
            moving: true,
            powerup_state: PowerupState::default(),
        }
    }

    fn wants_bomb(&self) -> Option<BombPlaced> {
        if self.frame % BOMB_EVERY_FRAMES != 0 {
            return None;
        }
        Some(BombPlaced {
            x: self.position.0 / TILE * TILE,
            y: self.position.1 / TILE * TILE,
            owner_id: self.me,
            placed_at: now_millis(),
            blast_radius: 1,
        })
    }

    /// Applies one remote message. Discrete events are keyed by tile, so
    /// a duplicate is a no-op.
    fn apply(&mut self, message: &Message) {
        match message {
            Message::PlayerState(state) => self.rival = Some(state.clone()),
            Message::BombPlaced(bomb) => {
                if self.bombs.insert((bomb.x, bomb.y)) {
                    info!(x = bomb.x, y = bomb.y, owner = %bomb.owner_id, "rival dropped a bomb");
                }
            }
            Message::ObjectDestroyed(block) => {
                self.destroyed.insert((block.x, block.y));
            }
            Message::GameOver(over) => info!(reason = %over.reason, "game over"),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn main() {
    blastlink::init_tracing("info");

    let cli = Cli::parse();
    let config = match cli.mode {
        Mode::Host { port } => NetworkConfig::host().with_port(port),
        Mode::Join { host_ip, port } => NetworkConfig::client(host_ip).with_port(port),
    };
    let mut network = GameNetwork::new(config);
    if !network.initialize() {
        std::process::exit(1);
    }

    let mut duel = Duel::new(network.role().player_id());
    let started = Instant::now();
    let mut was_connected = false;

    while started.elapsed() < MATCH_LENGTH && !network.phase().is_terminal() {
        let frame_start = Instant::now();

        for inbound in network.get_messages() {
            duel.apply(&inbound.envelope.message);
        }

        let connected = network.is_connected();
        if connected != was_connected {
            if connected {
                info!(peer = ?network.peer_addr(), "duel on");
            } else {
                warn!("rival went quiet");
            }
            was_connected = connected;
        }

        if connected {
            let state = duel.step();
            network.send_player_state(state);
            if let Some(bomb) = duel.wants_bomb() {
                duel.bombs.insert((bomb.x, bomb.y));
                network.send_bomb_placed(bomb);
            }
        }

        if let Some(rest) = FRAME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    network.send_game_over(GameOverReason::Other("time up".into()));
    network.disconnect();
    let stats = network.stats();
    info!(
        sent = stats.frames_sent,
        received = stats.frames_received,
        throttled = stats.throttled,
        bombs_seen = duel.bombs.len(),
        "match finished"
    );
}
