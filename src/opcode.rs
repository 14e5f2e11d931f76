//! Opcode knowledge shared by the pipeline: which blocks touch variables, how
//! a block is named to a learner, and which palette category it belongs to.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const VARIABLE_FIELD: &str = "VARIABLE";
pub const LIST_FIELD: &str = "LIST";

/// Fields whose value is the identity of a variable or list rather than a literal.
pub const REFERENCE_FIELDS: [&str; 2] = [VARIABLE_FIELD, LIST_FIELD];

/// Pseudo-slot holding a procedure's `proccode`.
pub const PROCCODE_SLOT: &str = "PROCCODE";

/// How a block uses the variable or list named in its reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Write,
    Delta,
    Read,
}

impl UsageKind {
    pub const ALL: [UsageKind; 3] = [UsageKind::Write, UsageKind::Delta, UsageKind::Read];
}

/// Block semantics tag, e.g. `motion_movesteps`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(String);

impl Opcode {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn usage(&self) -> Option<UsageKind> {
        variable_usage(&self.0)
    }

    /// Palette prefix, e.g. `motion` for `motion_movesteps`.
    pub fn category(&self) -> &str {
        self.0.split_once('_').map(|(head, _)| head).unwrap_or(&self.0)
    }

    pub fn category_label(&self) -> &'static str {
        category_label(self.category())
    }

    /// Learner-facing block text; unknown opcodes fall back to the raw tag.
    pub fn label(&self) -> String {
        block_label(&self.0)
            .map(ToString::to_string)
            .unwrap_or_else(|| self.0.clone())
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Opcode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

fn variable_usage(op: &str) -> Option<UsageKind> {
    match op {
        "data_setvariableto" => Some(UsageKind::Write),
        "data_changevariableby" => Some(UsageKind::Delta),
        "data_variable" | "data_showvariable" | "data_hidevariable" => Some(UsageKind::Read),
        "data_deletealloflist" => Some(UsageKind::Write),
        "data_addtolist" | "data_deleteoflist" | "data_insertatlist" | "data_replaceitemoflist" => {
            Some(UsageKind::Delta)
        }
        "data_listcontents"
        | "data_itemoflist"
        | "data_itemnumoflist"
        | "data_lengthoflist"
        | "data_listcontainsitem"
        | "data_showlist"
        | "data_hidelist" => Some(UsageKind::Read),
        _ => None,
    }
}

fn category_label(category: &str) -> &'static str {
    match category {
        "motion" => "Motion",
        "looks" => "Looks",
        "sound" => "Sound",
        "event" => "Events",
        "control" => "Control",
        "sensing" => "Sensing",
        "operator" => "Operators",
        "data" => "Variables",
        "procedures" | "argument" => "My Blocks",
        "pen" => "Pen",
        "music" => "Music",
        _ => "Other",
    }
}

fn block_label(op: &str) -> Option<&'static str> {
    let label = match op {
        "event_whenflagclicked" => "when green flag clicked",
        "event_whenthisspriteclicked" => "when this sprite clicked",
        "event_whenkeypressed" => "when key pressed",
        "event_whenbroadcastreceived" => "when I receive",
        "event_whenbackdropswitchesto" => "when backdrop switches to",
        "event_broadcast" => "broadcast",
        "event_broadcastandwait" => "broadcast and wait",
        "motion_movesteps" => "move () steps",
        "motion_turnright" => "turn right () degrees",
        "motion_turnleft" => "turn left () degrees",
        "motion_goto" => "go to",
        "motion_gotoxy" => "go to x () y ()",
        "motion_glidesecstoxy" => "glide () secs to x () y ()",
        "motion_changexby" => "change x by ()",
        "motion_setx" => "set x to ()",
        "motion_changeyby" => "change y by ()",
        "motion_sety" => "set y to ()",
        "motion_pointindirection" => "point in direction ()",
        "motion_pointtowards" => "point towards",
        "motion_ifonedgebounce" => "if on edge, bounce",
        "motion_setrotationstyle" => "set rotation style",
        "motion_xposition" => "x position",
        "motion_yposition" => "y position",
        "motion_direction" => "direction",
        "looks_say" => "say ()",
        "looks_sayforsecs" => "say () for () seconds",
        "looks_think" => "think ()",
        "looks_thinkforsecs" => "think () for () seconds",
        "looks_show" => "show",
        "looks_hide" => "hide",
        "looks_switchcostumeto" => "switch costume to",
        "looks_nextcostume" => "next costume",
        "looks_switchbackdropto" => "switch backdrop to",
        "looks_nextbackdrop" => "next backdrop",
        "looks_changesizeby" => "change size by ()",
        "looks_setsizeto" => "set size to () %",
        "looks_changeeffectby" => "change effect by ()",
        "looks_seteffectto" => "set effect to ()",
        "looks_cleargraphiceffects" => "clear graphic effects",
        "sound_play" => "start sound",
        "sound_playuntildone" => "play sound until done",
        "sound_stopallsounds" => "stop all sounds",
        "control_wait" => "wait () seconds",
        "control_repeat" => "repeat ()",
        "control_forever" => "forever",
        "control_if" => "if <> then",
        "control_if_else" => "if <> then / else",
        "control_wait_until" => "wait until <>",
        "control_repeat_until" => "repeat until <>",
        "control_stop" => "stop",
        "control_start_as_clone" => "when I start as a clone",
        "control_create_clone_of" => "create clone of",
        "control_delete_this_clone" => "delete this clone",
        "sensing_touchingobject" => "touching ?",
        "sensing_askandwait" => "ask () and wait",
        "sensing_answer" => "answer",
        "sensing_keypressed" => "key pressed?",
        "sensing_mousedown" => "mouse down?",
        "sensing_mousex" => "mouse x",
        "sensing_mousey" => "mouse y",
        "sensing_timer" => "timer",
        "sensing_resettimer" => "reset timer",
        "operator_add" => "() + ()",
        "operator_subtract" => "() - ()",
        "operator_multiply" => "() * ()",
        "operator_divide" => "() / ()",
        "operator_random" => "pick random () to ()",
        "operator_gt" => "() > ()",
        "operator_lt" => "() < ()",
        "operator_equals" => "() = ()",
        "operator_and" => "<> and <>",
        "operator_or" => "<> or <>",
        "operator_not" => "not <>",
        "operator_join" => "join () ()",
        "operator_mod" => "() mod ()",
        "operator_round" => "round ()",
        "operator_mathop" => "math function of ()",
        "data_variable" => "variable",
        "data_setvariableto" => "set variable to ()",
        "data_changevariableby" => "change variable by ()",
        "data_showvariable" => "show variable",
        "data_hidevariable" => "hide variable",
        "data_addtolist" => "add () to list",
        "data_deleteoflist" => "delete () of list",
        "data_deletealloflist" => "delete all of list",
        "data_insertatlist" => "insert () at () of list",
        "data_replaceitemoflist" => "replace item () of list",
        "data_itemoflist" => "item () of list",
        "data_lengthoflist" => "length of list",
        "data_listcontainsitem" => "list contains ()?",
        "data_listcontents" => "list",
        "procedures_definition" => "define",
        "procedures_call" => "custom block",
        "argument_reporter_string_number" => "block argument",
        "argument_reporter_boolean" => "block argument <>",
        "pen_clear" => "erase all",
        "pen_stamp" => "stamp",
        "pen_penDown" => "pen down",
        "pen_penUp" => "pen up",
        "pen_setPenColorToColor" => "set pen color to ()",
        "pen_changePenSizeBy" => "change pen size by ()",
        "pen_setPenSizeTo" => "set pen size to ()",
        _ => return None,
    };
    Some(label)
}
