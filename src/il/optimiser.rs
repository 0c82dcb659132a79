use std::collections::{HashMap, HashSet};

use log::debug;

use crate::{ast::BinOp, listing::Position};

use super::tac::*;

/// Optimise a TAC listing by rewriting it until a full pass produces
/// no change. Every changing pass removes at least one instruction, so
/// the loop terminates without an iteration cap.
pub fn optimise(listing: TacListing) -> TacListing {
    let mut optimiser = Optimiser::new(listing);
    optimiser.run();
    optimiser.listing
}

struct Optimiser {
    listing: TacListing,
}
impl Optimiser {
    fn new(listing: TacListing) -> Self {
        Self { listing }
    }

    fn run(&mut self) {
        let mut passes = 0usize;
        while self.pass() {
            passes += 1;
        }
        debug!(
            "optimisation reached a fixpoint after {} changing passes",
            passes
        );
    }

    /// One rewrite pass: fold and simplify temporary definitions,
    /// substitute their replacements everywhere, then drop temporaries
    /// that no longer appear outside their own definition.
    fn pass(&mut self) -> bool {
        let mut changed = false;
        let mut removals: HashSet<Position> = HashSet::new();
        let mut replacements: HashMap<usize, Value> = HashMap::new();

        for (line, instr) in self.listing.iter_lines() {
            match instr {
                TacInstr::Bin(Name::Temp(temp), op, lhs, rhs) => {
                    if let Some(result) = fold_constant(*op, lhs, rhs) {
                        replacements.insert(*temp, Value::Const(result));
                        removals.insert(line);
                        changed = true;
                    } else if let Some(value) = simplify_identity(*op, lhs, rhs) {
                        replacements.insert(*temp, value);
                        removals.insert(line);
                        changed = true;
                    }
                }
                // A direct copy into a temporary is always propagated.
                TacInstr::Copy(Name::Temp(temp), value) => {
                    replacements.insert(*temp, value.clone());
                    removals.insert(line);
                    changed = true;
                }
                _ => (),
            }
        }

        // Substitute mapped temporaries into every surviving
        // instruction. One step per pass: a replacement that is itself
        // a mapped temporary resolves on the next pass.
        if !replacements.is_empty() {
            for (line, instr) in self.listing.iter_lines_mut() {
                if removals.contains(&line) {
                    continue;
                }
                for value in instr.operands_mut() {
                    if let Some(replacement) = value.as_temp().and_then(|t| replacements.get(&t)) {
                        *value = replacement.clone();
                        changed = true;
                    }
                }
            }
        }

        changed |= self.inline_single_use(&mut removals);

        if !removals.is_empty() {
            self.remove_lines(removals);
            changed = true;
        }

        changed
    }

    /// Re-index the surviving temporary definitions, count how often
    /// each temporary appears, and eliminate those that only occur in
    /// their own definition. A definition whose result is still read
    /// somewhere is left alone; when the sole remaining mention of a
    /// binary definition is the right-hand side of a copy, the
    /// operation is spliced into that copy instead.
    fn inline_single_use(&mut self, removals: &mut HashSet<Position>) -> bool {
        let mut changed = false;
        let mut definitions: Vec<(usize, Position)> = vec![];
        let mut occurrences: HashMap<usize, usize> = HashMap::new();

        for (line, instr) in self.listing.iter_lines() {
            if removals.contains(&line) {
                continue;
            }
            if let Some(Name::Temp(temp)) = instr.dest() {
                definitions.push((*temp, line));
                *occurrences.entry(*temp).or_default() += 1;
            }
            for value in instr.operands() {
                if let Some(temp) = value.as_temp() {
                    *occurrences.entry(temp).or_default() += 1;
                }
            }
        }

        for (temp, def_line) in definitions {
            if occurrences.get(&temp) != Some(&1) {
                continue;
            }
            let Some(definition) = self.listing.get(def_line).cloned() else {
                continue;
            };

            for (line, instr) in self.listing.iter_lines_mut() {
                if line == def_line || removals.contains(&line) {
                    continue;
                }
                match &definition {
                    TacInstr::Bin(_, op, lhs, rhs) => {
                        if let TacInstr::Copy(dest, Value::Name(Name::Temp(used))) = instr {
                            if *used == temp {
                                let dest = dest.clone();
                                *instr = TacInstr::Bin(dest, *op, lhs.clone(), rhs.clone());
                                changed = true;
                            }
                        }
                    }
                    TacInstr::Copy(_, copied) => {
                        for value in instr.operands_mut() {
                            if value.as_temp() == Some(temp) {
                                *value = copied.clone();
                                changed = true;
                            }
                        }
                    }
                    _ => (),
                }
            }

            removals.insert(def_line);
        }

        changed
    }

    fn remove_lines(&mut self, lines: HashSet<Position>) {
        let mut lines: Vec<_> = lines.into_iter().collect();
        lines.sort_unstable();
        for line in lines.into_iter().rev() {
            self.listing.remove(line);
        }
    }
}

/// Compute a binary operation over two constants. Integer arithmetic
/// is exact and declines to fold on overflow; the mode is float as
/// soon as either literal's text contains a decimal point. Division by
/// zero is never folded and stays behind as a runtime operation.
fn fold_constant(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Constant> {
    let (Value::Const(lhs), Value::Const(rhs)) = (lhs, rhs) else {
        return None;
    };

    if lhs.is_float() || rhs.is_float() {
        fold_float(op, lhs.as_float()?, rhs.as_float()?)
    } else {
        fold_int(op, lhs.as_int()?, rhs.as_int()?)
    }
}

fn fold_int(op: BinOp, lhs: i64, rhs: i64) -> Option<Constant> {
    let result = match op {
        BinOp::Add => lhs.checked_add(rhs)?,
        BinOp::Sub => lhs.checked_sub(rhs)?,
        BinOp::Mul => lhs.checked_mul(rhs)?,
        BinOp::Div => {
            if rhs == 0 {
                return None;
            }
            lhs.checked_div(rhs)?
        }
        BinOp::Lt => return Some(bool_constant(lhs < rhs)),
        BinOp::Lte => return Some(bool_constant(lhs <= rhs)),
        BinOp::Gt => return Some(bool_constant(lhs > rhs)),
        BinOp::Gte => return Some(bool_constant(lhs >= rhs)),
        BinOp::Eq => return Some(bool_constant(lhs == rhs)),
        BinOp::Neq => return Some(bool_constant(lhs != rhs)),
    };
    Some(Constant::new(result.to_string()))
}

fn fold_float(op: BinOp, lhs: f64, rhs: f64) -> Option<Constant> {
    let result = match op {
        BinOp::Add => lhs + rhs,
        BinOp::Sub => lhs - rhs,
        BinOp::Mul => lhs * rhs,
        BinOp::Div => {
            if rhs == 0.0 {
                return None;
            }
            lhs / rhs
        }
        BinOp::Lt => return Some(bool_constant(lhs < rhs)),
        BinOp::Lte => return Some(bool_constant(lhs <= rhs)),
        BinOp::Gt => return Some(bool_constant(lhs > rhs)),
        BinOp::Gte => return Some(bool_constant(lhs >= rhs)),
        BinOp::Eq => return Some(bool_constant(lhs == rhs)),
        BinOp::Neq => return Some(bool_constant(lhs != rhs)),
    };
    Some(Constant::new(format_significant(result)))
}

/// Relational operators always fold to the literal `"1"` or `"0"`.
fn bool_constant(value: bool) -> Constant {
    Constant::new(if value { "1" } else { "0" })
}

/// Render a float with 12 significant digits, then strip trailing
/// zeros and a trailing decimal point.
fn format_significant(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (11 - magnitude).clamp(0, 17) as usize;
    let mut text = format!("{value:.decimals$}");
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    text
}

/// Apply the algebraic identities `x+0`, `0+x`, `x-0`, `x*1`, `1*x`,
/// `x*0`, `0*x` and `x/1`. Matching is against the literal spelling,
/// so `0.0` does not trigger an identity.
fn simplify_identity(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    let zero = |value: &Value| matches!(value, Value::Const(c) if c.is_literally("0"));
    let one = |value: &Value| matches!(value, Value::Const(c) if c.is_literally("1"));

    match op {
        BinOp::Add if zero(rhs) => Some(lhs.clone()),
        BinOp::Add if zero(lhs) => Some(rhs.clone()),
        BinOp::Sub if zero(rhs) => Some(lhs.clone()),
        BinOp::Mul if one(rhs) => Some(lhs.clone()),
        BinOp::Mul if one(lhs) => Some(rhs.clone()),
        BinOp::Mul if zero(lhs) || zero(rhs) => Some(Value::Const(Constant::new("0"))),
        BinOp::Div if one(rhs) => Some(lhs.clone()),
        _ => None,
    }
}
