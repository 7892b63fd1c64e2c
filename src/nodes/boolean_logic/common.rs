//! # Boolean Logic Common Utilities
//!
//! Gate kinds and their truth functions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean function a logic gate computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateKind {
  /// True when every input is true.
  #[default]
  And,
  /// True when any input is true.
  Or,
  /// True when an odd number of inputs are true.
  Xor,
  /// Negated XOR.
  Xnor,
  /// Negated AND.
  Nand,
  /// Negated OR.
  Nor,
  /// Negates its single input.
  Not,
}

impl GateKind {
  /// Tag used in settings and payloads.
  pub fn as_str(self) -> &'static str {
    match self {
      GateKind::And => "AND",
      GateKind::Or => "OR",
      GateKind::Xor => "XOR",
      GateKind::Xnor => "XNOR",
      GateKind::Nand => "NAND",
      GateKind::Nor => "NOR",
      GateKind::Not => "NOT",
    }
  }

  /// Number of input slots for a gate wired to `configured` inputs.
  ///
  /// NOT always has one slot; every other gate has at least one.
  pub fn slot_count(self, configured: usize) -> usize {
    match self {
      GateKind::Not => 1,
      _ => configured.max(1),
    }
  }

  /// Applies the gate to a complete set of inputs.
  ///
  /// NOT reads only the first input; an empty input list evaluates as all
  /// inputs false.
  pub fn evaluate(self, inputs: &[bool]) -> bool {
    let any = inputs.iter().any(|&value| value);
    let all = !inputs.is_empty() && inputs.iter().all(|&value| value);
    let odd = inputs.iter().filter(|&&value| value).count() % 2 == 1;
    match self {
      GateKind::And => all,
      GateKind::Or => any,
      GateKind::Xor => odd,
      GateKind::Xnor => !odd,
      GateKind::Nand => !all,
      GateKind::Nor => !any,
      GateKind::Not => !inputs.first().copied().unwrap_or(false),
    }
  }
}

impl fmt::Display for GateKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Label of the input slot at `index`: `input_a`, `input_b`, ...
///
/// Past `input_z` the label continues with the numeric index.
pub fn input_label(index: usize) -> String {
  match u8::try_from(index) {
    Ok(offset) if offset < 26 => format!("input_{}", char::from(b'a' + offset)),
    _ => format!("input_{index}"),
  }
}
