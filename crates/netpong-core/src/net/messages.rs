use serde::{Deserialize, Serialize};

/// One of the two paddles. Serialized as `"A"` / `"B"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Level-triggered movement intent for one paddle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intent {
    pub up: bool,
    pub down: bool,
}

impl Intent {
    /// -1.0 for up, 1.0 for down, 0.0 for neither or both.
    pub fn direction(self) -> f32 {
        f32::from(u8::from(self.down)) - f32::from(u8::from(self.up))
    }

    pub fn flipped(self) -> Self {
        Self {
            up: self.down,
            down: self.up,
        }
    }
}

/// Canonical intent update handed to the simulation. `None` leaves that
/// paddle's current intent untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentUpdate {
    pub a: Option<Intent>,
    pub b: Option<Intent>,
}

/// A `paddle_move` message in the addressing shape it arrived in.
///
/// Clients may address one side (`player: "A"|"B"`) or both sides, either
/// with four flat booleans (`aUp`, `aDown`, `bUp`, `bDown`) or with a nested
/// `players: {A: {..}, B: {..}}` object. The shape is kept so the message can
/// be re-encoded as received; [`PaddleMove::intent_update`] collapses all
/// three into one [`IntentUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPaddleMove", into = "RawPaddleMove")]
pub enum PaddleMove {
    Single { player: Side, intent: Intent },
    BothFlat { a: Intent, b: Intent },
    BothNested { a: Intent, b: Intent },
}

impl PaddleMove {
    pub fn intent_update(&self) -> IntentUpdate {
        match *self {
            PaddleMove::Single {
                player: Side::A,
                intent,
            } => IntentUpdate {
                a: Some(intent),
                b: None,
            },
            PaddleMove::Single {
                player: Side::B,
                intent,
            } => IntentUpdate {
                a: None,
                b: Some(intent),
            },
            PaddleMove::BothFlat { a, b } | PaddleMove::BothNested { a, b } => IntentUpdate {
                a: Some(a),
                b: Some(b),
            },
        }
    }

    pub fn addresses(&self, side: Side) -> bool {
        match self {
            PaddleMove::Single { player, .. } => *player == side,
            PaddleMove::BothFlat { .. } | PaddleMove::BothNested { .. } => true,
        }
    }

    /// Swap `up`/`down` for `side`. Returns false if the message does not
    /// address that side.
    pub fn flip(&mut self, side: Side) -> bool {
        let target = match (self, side) {
            (PaddleMove::Single { player, intent }, side) if *player == side => intent,
            (PaddleMove::Single { .. }, _) => return false,
            (PaddleMove::BothFlat { a, .. } | PaddleMove::BothNested { a, .. }, Side::A) => a,
            (PaddleMove::BothFlat { b, .. } | PaddleMove::BothNested { b, .. }, Side::B) => b,
        };
        *target = target.flipped();
        true
    }
}

/// Flat wire representation covering all three `paddle_move` shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPaddleMove {
    player: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    up: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    down: Option<bool>,
    #[serde(default, rename = "aUp", skip_serializing_if = "Option::is_none")]
    a_up: Option<bool>,
    #[serde(default, rename = "aDown", skip_serializing_if = "Option::is_none")]
    a_down: Option<bool>,
    #[serde(default, rename = "bUp", skip_serializing_if = "Option::is_none")]
    b_up: Option<bool>,
    #[serde(default, rename = "bDown", skip_serializing_if = "Option::is_none")]
    b_down: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    players: Option<RawPlayers>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawPlayers {
    #[serde(default, rename = "A")]
    a: Intent,
    #[serde(default, rename = "B")]
    b: Intent,
}

impl TryFrom<RawPaddleMove> for PaddleMove {
    type Error = String;

    fn try_from(raw: RawPaddleMove) -> Result<Self, Self::Error> {
        let single = |player| PaddleMove::Single {
            player,
            intent: Intent {
                up: raw.up.unwrap_or(false),
                down: raw.down.unwrap_or(false),
            },
        };
        match raw.player.as_str() {
            "A" => Ok(single(Side::A)),
            "B" => Ok(single(Side::B)),
            "both" => match raw.players {
                Some(players) => Ok(PaddleMove::BothNested {
                    a: players.a,
                    b: players.b,
                }),
                None => Ok(PaddleMove::BothFlat {
                    a: Intent {
                        up: raw.a_up.unwrap_or(false),
                        down: raw.a_down.unwrap_or(false),
                    },
                    b: Intent {
                        up: raw.b_up.unwrap_or(false),
                        down: raw.b_down.unwrap_or(false),
                    },
                }),
            },
            other => Err(format!("unknown player: {other:?}")),
        }
    }
}

impl From<PaddleMove> for RawPaddleMove {
    fn from(msg: PaddleMove) -> Self {
        let empty = RawPaddleMove {
            player: String::new(),
            up: None,
            down: None,
            a_up: None,
            a_down: None,
            b_up: None,
            b_down: None,
            players: None,
        };
        match msg {
            PaddleMove::Single { player, intent } => RawPaddleMove {
                player: player.to_string(),
                up: Some(intent.up),
                down: Some(intent.down),
                ..empty
            },
            PaddleMove::BothFlat { a, b } => RawPaddleMove {
                player: "both".to_string(),
                a_up: Some(a.up),
                a_down: Some(a.down),
                b_up: Some(b.up),
                b_down: Some(b.down),
                ..empty
            },
            PaddleMove::BothNested { a, b } => RawPaddleMove {
                player: "both".to_string(),
                players: Some(RawPlayers { a, b }),
                ..empty
            },
        }
    }
}

/// `reset` request. `full` also zeroes both scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetMsg {
    #[serde(default)]
    pub full: bool,
}

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PaddleMove(PaddleMove),
    Reset(ResetMsg),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleView {
    pub y: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddlesView {
    #[serde(rename = "A")]
    pub a: PaddleView,
    #[serde(rename = "B")]
    pub b: PaddleView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "B")]
    pub b: u32,
}

impl Scores {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

/// Full observable game state at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateMsg {
    pub seq: u64,
    pub ball: BallView,
    pub paddles: PaddlesView,
    pub scores: Scores,
    pub ts: u64,
}

/// Messages sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State(StateMsg),
}
