use log::debug;

use crate::ast::*;

use super::{label_generator::*, name_generator::*, tac::*};

/// Generate a three-address code listing for a validated program.
/// Temporary and label counters start fresh on every call.
pub fn generate(program: &Program) -> TacListing {
    TacGenerator::generate(program)
}

struct TacGenerator {
    listing: TacListing,
    name_generator: NameGenerator,
    label_generator: LabelGenerator,
}
impl TacGenerator {
    fn generate(program: &Program) -> TacListing {
        let mut tac = Self {
            listing: TacListing::new(),
            name_generator: NameGenerator::new(),
            label_generator: LabelGenerator::new(),
        };

        tac.lower_block(&program.function.body);

        debug!("lowered program to {} instructions", tac.listing.len());
        tac.listing
    }

    fn lower_block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.lower_stmt(statement);
        }
    }

    fn lower_stmt(&mut self, statement: &Statement) {
        match &statement.stmt_kind {
            StmtKind::Decl(decl) => self.lower_decl(decl),
            StmtKind::Assign(assign) => self.lower_assign(assign),
            StmtKind::If(if_stmt) => self.lower_if(if_stmt),
            StmtKind::Return(ret) => {
                let value = self.lower_expr(&ret.value);
                self.emit(TacInstr::Return(Some(value)));
            }
            StmtKind::Block(block) => self.lower_block(block),
        }
    }

    /// Lower a declaration. A declaration without an initializer emits
    /// nothing; initialization-before-use is the type checker's concern.
    fn lower_decl(&mut self, decl: &Decl) {
        if let Some(initializer) = &decl.initializer {
            let value = self.lower_expr(initializer);
            self.emit(TacInstr::Copy(Name::Var(decl.name.clone()), value));
        }
    }

    /// Lower an assignment. Compound assignments are desugared into the
    /// underlying binary operation on a fresh temporary, followed by a
    /// copy back into the target.
    fn lower_assign(&mut self, assign: &Assign) {
        let target = Name::Var(assign.target.clone());
        let value = self.lower_expr(&assign.value);

        match assign.op.base_op() {
            None => self.emit(TacInstr::Copy(target, value)),
            Some(op) => {
                let temp = self.name_generator.next_temp();
                self.emit(TacInstr::Bin(
                    temp.clone(),
                    op,
                    Value::Name(target.clone()),
                    value,
                ));
                self.emit(TacInstr::Copy(target, Value::Name(temp)));
            }
        }
    }

    /// Lower an if-statement to explicit conditional jumps. Both arms
    /// always get a label, and the false arm is reached through an
    /// unconditional jump.
    fn lower_if(&mut self, if_stmt: &If) {
        let cond = self.lower_expr(&if_stmt.condition);
        let true_lbl = self.label_generator.next_label();
        let false_lbl = self.label_generator.next_label();
        let end_lbl = self.label_generator.next_label();

        self.emit(TacInstr::IfGoto(cond, true_lbl));
        self.emit(TacInstr::Goto(false_lbl));

        self.emit(TacInstr::Label(true_lbl));
        self.lower_stmt(&if_stmt.then_branch);
        self.emit(TacInstr::Goto(end_lbl));

        self.emit(TacInstr::Label(false_lbl));
        if let Some(else_branch) = &if_stmt.else_branch {
            self.lower_stmt(else_branch);
        }
        self.emit(TacInstr::Label(end_lbl));
    }

    /// Lower an expression, returning the value later instructions
    /// should use to refer to its result. Literals and variables lower
    /// to themselves without emitting an instruction.
    fn lower_expr(&mut self, expr: &Expr) -> Value {
        match &expr.expr_kind {
            ExprKind::Number(text) => Value::Const(Constant::new(text.clone())),
            ExprKind::Var(name) => Value::Name(Name::Var(name.clone())),
            ExprKind::Binary(bin) => self.lower_binexpr(bin),
        }
    }

    fn lower_binexpr(&mut self, expr: &BinExpr) -> Value {
        let lhs = self.lower_expr(&expr.lhs);
        let rhs = self.lower_expr(&expr.rhs);

        let temp = self.name_generator.next_temp();
        self.emit(TacInstr::Bin(temp.clone(), expr.op, lhs, rhs));

        Value::Name(temp)
    }

    fn emit(&mut self, instr: TacInstr) {
        self.listing.push(instr);
    }
}

#[cfg(test)]
mod tests {
    use crate::{lexer::lex, parser::parse, type_checking::verify_well_typed};

    use super::*;

    macro_rules! assert_generates {
        ($source:expr, $il:expr) => {{
            let tokens = lex($source).unwrap();
            let program = parse(&tokens).unwrap();
            verify_well_typed(&program).unwrap();
            let instrs: Vec<_> = generate(&program)
                .into_vec()
                .iter()
                .map(ToString::to_string)
                .collect();

            assert_eq!(&$il[..], instrs);
        }};
    }

    #[test]
    fn declarations_and_expressions_generate_tac() {
        assert_generates!(
            "int main() { int a = 2; int b = 3; int c = a + b * 0; return c; }",
            [
                "a = 2",
                "b = 3",
                "t1 = b * 0",
                "t2 = a + t1",
                "c = t2",
                "return c",
            ]
        );
    }

    #[test]
    fn declaration_without_initializer_emits_nothing() {
        assert_generates!("int main() { int a; return 0; }", ["return 0"]);
    }

    #[test]
    fn compound_assignment_is_desugared() {
        assert_generates!(
            "int main() { int x = 1; x += 2; return x; }",
            ["x = 1", "t1 = x + 2", "x = t1", "return x"]
        );
    }

    #[test]
    fn if_else_generates_both_labels_and_a_fallthrough_jump() {
        assert_generates!(
            "int main() { int a = 1; if (a < 2) { a = 3; } else { a = 4; } return a; }",
            [
                "a = 1",
                "t1 = a < 2",
                "if t1 goto L1",
                "goto L2",
                "L1:",
                "a = 3",
                "goto L3",
                "L2:",
                "a = 4",
                "L3:",
                "return a",
            ]
        );
    }

    #[test]
    fn if_without_else_still_materializes_the_false_label() {
        assert_generates!(
            "int main() { int a = 1; if (a) a = 2; return a; }",
            [
                "a = 1",
                "if a goto L1",
                "goto L2",
                "L1:",
                "a = 2",
                "goto L3",
                "L2:",
                "L3:",
                "return a",
            ]
        );
    }

    #[test]
    fn counters_reset_between_runs() {
        let tokens = lex("int main() { int a = 1 + 2; if (a) { return 1; } return 0; }").unwrap();
        let program = parse(&tokens).unwrap();

        let first: Vec<_> = generate(&program)
            .into_vec()
            .iter()
            .map(ToString::to_string)
            .collect();
        let second: Vec<_> = generate(&program)
            .into_vec()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(first, second);
        assert!(first.contains(&"t1 = 1 + 2".to_string()));
    }

    #[test]
    fn nested_expressions_allocate_temporaries_in_evaluation_order() {
        assert_generates!(
            "int main() { int x = 1; int y = (x + 2) * (x - 3); return y; }",
            [
                "x = 1",
                "t1 = x + 2",
                "t2 = x - 3",
                "t3 = t1 * t2",
                "y = t3",
                "return y",
            ]
        );
    }
}
