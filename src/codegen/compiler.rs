//! Lowers optimised TAC into the pseudo-assembly listing.
use std::collections::HashMap;

use log::debug;

use crate::{
    ast::BinOp,
    il::{Constant, Name, TacInstr, TacListing, Value},
};

use super::assembly::*;

/// Compile a TAC listing into pseudo-assembly. The relational branch
/// label counter is scoped to this call and never resets mid-run, so
/// every synthesized label pair is unique.
pub fn compile(tac: &TacListing) -> AsmListing {
    AsmCompiler::new().compile(tac)
}

struct AsmCompiler {
    asm: AsmListing,
    registers: HashMap<usize, Register>,
    label_counter: usize,
}

impl AsmCompiler {
    fn new() -> Self {
        Self {
            asm: AsmListing::new(),
            registers: HashMap::new(),
            label_counter: 0,
        }
    }

    fn compile(mut self, tac: &TacListing) -> AsmListing {
        self.emit_header(tac);

        for instr in tac.iter_instructions() {
            self.lower_instr(instr);
        }

        self.emit(AsmLine::Blank);
        self.emit(AsmLine::Comment("--- end of generated assembly ---".to_string()));

        debug!("compiled {} TAC instructions into {} lines", tac.len(), self.asm.len());
        self.asm
    }

    /// Scan the listing for named memory locations and list them in a
    /// comment block. No storage is allocated here; the header is
    /// informational.
    fn emit_header(&mut self, tac: &TacListing) {
        let variables = discover_variables(tac);

        self.emit(AsmLine::Comment("--- generated pseudo-assembly ---".to_string()));
        self.emit(AsmLine::Comment("Variables (memory):".to_string()));
        for variable in variables {
            self.emit(AsmLine::Comment(format!("var: {}", variable)));
        }
        self.emit(AsmLine::Blank);
    }

    fn lower_instr(&mut self, instr: &TacInstr) {
        match instr {
            TacInstr::Label(label) => self.emit(AsmLine::Label(label.to_string())),
            TacInstr::Goto(label) => self.jump(Branch::Jmp, label.to_string()),
            TacInstr::IfGoto(cond, label) => self.lower_if_goto(cond, label.to_string()),
            TacInstr::Return(value) => self.lower_return(value.as_ref()),
            TacInstr::Copy(dest, src) => self.lower_copy(dest, src),
            TacInstr::Bin(dest, op, lhs, rhs) => self.lower_bin(dest, *op, lhs, rhs),
        }
    }

    /// A constant condition either always or never jumps; a branch that
    /// is never taken is elided entirely. Conditions held in a variable
    /// are staged through `r_load` before comparing.
    fn lower_if_goto(&mut self, cond: &Value, label: String) {
        match self.operand(cond) {
            Operand::Immediate(constant) => {
                if !constant.is_literally("0") {
                    self.jump(Branch::Jmp, label);
                }
            }
            register @ Operand::Register(_) => {
                self.instr(Instr::Cmp(register, immediate_zero()));
                self.jump(Branch::Jne, label);
            }
            memory @ Operand::Memory(_) => {
                self.instr(Instr::Mov(Operand::Register(Register::Load), memory));
                self.instr(Instr::Cmp(
                    Operand::Register(Register::Load),
                    immediate_zero(),
                ));
                self.jump(Branch::Jne, label);
            }
        }
    }

    fn lower_return(&mut self, value: Option<&Value>) {
        let result = match value {
            Some(value) => self.operand(value),
            None => immediate_zero(),
        };
        self.instr(Instr::Mov(Operand::Register(Register::Ret), result));
        self.instr(Instr::Return);
    }

    fn lower_copy(&mut self, dest: &Name, src: &Value) {
        let src = self.operand(src);
        let dest = self.name_operand(dest);
        self.instr(Instr::Mov(dest, src));
    }

    fn lower_bin(&mut self, dest: &Name, op: BinOp, lhs: &Value, rhs: &Value) {
        match dest {
            Name::Temp(temp) => {
                let dest = self.register_for(*temp);
                self.lower_bin_to_register(dest, op, lhs, rhs);
            }
            Name::Var(name) => self.lower_bin_to_variable(name.clone(), op, lhs, rhs),
        }
    }

    /// Compute a binary operation into a temporary's own register: load
    /// the left operand, then apply the operation with the right one.
    /// Relational operations expand to a compare-and-branch sequence
    /// that leaves 0 or 1 in the register.
    fn lower_bin_to_register(&mut self, dest: Register, op: BinOp, lhs: &Value, rhs: &Value) {
        let lhs = self.operand(lhs);
        let rhs = self.operand(rhs);

        if lhs != Operand::Register(dest) {
            self.instr(Instr::Mov(Operand::Register(dest), lhs));
        }

        if let Some(instr) = arithmetic(op, Operand::Register(dest), rhs.clone()) {
            self.instr(instr);
        } else {
            self.lower_comparison(dest, op, rhs);
        }
    }

    fn lower_comparison(&mut self, dest: Register, op: BinOp, rhs: Operand) {
        let true_lbl = format!("__Ltrue{}", self.label_counter);
        let end_lbl = format!("__Lend{}", self.label_counter);
        self.label_counter += 1;

        // A variable operand cannot be compared directly; stage it
        // through r_cmp first.
        if let Operand::Memory(_) = rhs {
            self.instr(Instr::Mov(Operand::Register(Register::Cmp), rhs));
            self.instr(Instr::Cmp(
                Operand::Register(dest),
                Operand::Register(Register::Cmp),
            ));
        } else {
            self.instr(Instr::Cmp(Operand::Register(dest), rhs));
        }

        self.jump(branch_for(op), true_lbl.clone());
        self.instr(Instr::Mov(Operand::Register(dest), immediate_zero()));
        self.jump(Branch::Jmp, end_lbl.clone());
        self.emit(AsmLine::Label(true_lbl));
        self.instr(Instr::Mov(
            Operand::Register(dest),
            Operand::Immediate(Constant::new("1")),
        ));
        self.emit(AsmLine::Label(end_lbl));
    }

    /// Compute a binary operation into a variable: stage the left
    /// operand through `r_tmp`, operate, then store. Relational
    /// operators are not expanded in this shape and only the staged
    /// copy survives.
    fn lower_bin_to_variable(&mut self, name: String, op: BinOp, lhs: &Value, rhs: &Value) {
        let lhs = self.operand(lhs);
        let rhs = self.operand(rhs);

        self.instr(Instr::Mov(Operand::Register(Register::Tmp), lhs));
        if let Some(instr) = arithmetic(op, Operand::Register(Register::Tmp), rhs) {
            self.instr(instr);
        }
        self.instr(Instr::Mov(
            Operand::Memory(name),
            Operand::Register(Register::Tmp),
        ));
    }

    /// Translate a TAC value into an instruction operand, assigning the
    /// backing register on first sight of a temporary.
    fn operand(&mut self, value: &Value) -> Operand {
        match value {
            Value::Const(constant) => Operand::Immediate(constant.clone()),
            Value::Name(name) => self.name_operand(name),
        }
    }

    fn name_operand(&mut self, name: &Name) -> Operand {
        match name {
            Name::Temp(temp) => Operand::Register(self.register_for(*temp)),
            Name::Var(name) => Operand::Memory(name.clone()),
        }
    }

    fn register_for(&mut self, temp: usize) -> Register {
        *self
            .registers
            .entry(temp)
            .or_insert(Register::Virtual(temp))
    }

    fn jump(&mut self, branch: Branch, target: String) {
        self.instr(Instr::Jump(branch, target));
    }

    fn instr(&mut self, instr: Instr) {
        self.emit(AsmLine::Instr(instr));
    }

    fn emit(&mut self, line: AsmLine) {
        self.asm.push(line);
    }
}

/// Collect the named memory locations a listing refers to, in order of
/// first appearance.
fn discover_variables(tac: &TacListing) -> Vec<String> {
    let mut variables: Vec<String> = vec![];
    let mut record = |name: &Name| {
        if let Name::Var(name) = name {
            if !variables.iter().any(|known| known == name) {
                variables.push(name.clone());
            }
        }
    };

    for instr in tac.iter_instructions() {
        if let Some(dest) = instr.dest() {
            record(dest);
        }
        for value in instr.operands() {
            if let Value::Name(name) = value {
                record(name);
            }
        }
    }

    variables
}

fn arithmetic(op: BinOp, dest: Operand, src: Operand) -> Option<Instr> {
    Some(match op {
        BinOp::Add => Instr::Add(dest, src),
        BinOp::Sub => Instr::Sub(dest, src),
        BinOp::Mul => Instr::Mul(dest, src),
        BinOp::Div => Instr::Div(dest, src),
        _ => return None,
    })
}

fn branch_for(op: BinOp) -> Branch {
    match op {
        BinOp::Lt => Branch::Jl,
        BinOp::Lte => Branch::Jle,
        BinOp::Gt => Branch::Jg,
        BinOp::Gte => Branch::Jge,
        BinOp::Eq => Branch::Je,
        BinOp::Neq => Branch::Jne,
        _ => unreachable!("arithmetic operators do not branch"),
    }
}

fn immediate_zero() -> Operand {
    Operand::Immediate(Constant::new("0"))
}

#[cfg(test)]
mod tests {
    use crate::{il, lexer::lex, parser::parse, type_checking::verify_well_typed};

    use super::*;

    fn compile_lines(tac: &TacListing) -> Vec<String> {
        compile(tac).into_vec().iter().map(ToString::to_string).collect()
    }

    fn listing(instrs: Vec<TacInstr>) -> TacListing {
        instrs.into_iter().collect()
    }

    fn var(name: &str) -> Value {
        Value::Name(Name::Var(name.to_string()))
    }

    fn temp(index: usize) -> Value {
        Value::Name(Name::Temp(index))
    }

    fn constant(text: &str) -> Value {
        Value::Const(Constant::new(text))
    }

    /// Strip the header and epilogue, keeping only the lowered body.
    fn body(lines: Vec<String>) -> Vec<String> {
        let header_end = lines.iter().position(|line| line.is_empty()).unwrap();
        let epilogue_start = lines.iter().rposition(|line| line.is_empty()).unwrap();
        lines[header_end + 1..epilogue_start].to_vec()
    }

    #[test]
    fn variables_are_listed_in_order_of_first_appearance() {
        let tac = listing(vec![
            TacInstr::Copy(Name::Var("a".to_string()), constant("2")),
            TacInstr::Copy(Name::Var("b".to_string()), var("a")),
            TacInstr::Return(Some(var("b"))),
        ]);

        let lines = compile_lines(&tac);
        assert_eq!(
            vec![
                "; --- generated pseudo-assembly ---",
                "; Variables (memory):",
                "; var: a",
                "; var: b",
                "",
            ],
            lines[..5].to_vec()
        );
    }

    #[test]
    fn copies_into_temporaries_use_their_register() {
        let tac = listing(vec![
            TacInstr::Copy(Name::Temp(3), constant("7")),
            TacInstr::Copy(Name::Var("a".to_string()), temp(3)),
        ]);

        assert_eq!(vec!["MOV r3, 7", "MOV a, r3"], body(compile_lines(&tac)));
    }

    #[test]
    fn arithmetic_loads_the_left_operand_then_operates() {
        let tac = listing(vec![TacInstr::Bin(
            Name::Temp(1),
            BinOp::Add,
            var("a"),
            constant("2"),
        )]);

        assert_eq!(vec!["MOV r1, a", "ADD r1, 2"], body(compile_lines(&tac)));
    }

    #[test]
    fn relational_result_expands_to_a_compare_and_branch_sequence() {
        let tac = listing(vec![
            TacInstr::Copy(Name::Temp(1), constant("5")),
            TacInstr::Bin(Name::Temp(2), BinOp::Lt, temp(1), constant("9")),
        ]);

        assert_eq!(
            vec![
                "MOV r1, 5",
                "MOV r2, r1",
                "CMP r2, 9",
                "JL __Ltrue0",
                "MOV r2, 0",
                "JMP __Lend0",
                "__Ltrue0:",
                "MOV r2, 1",
                "__Lend0:",
            ],
            body(compile_lines(&tac))
        );
    }

    #[test]
    fn relational_label_pairs_never_repeat_within_a_run() {
        let tac = listing(vec![
            TacInstr::Bin(Name::Temp(1), BinOp::Lt, constant("1"), constant("2")),
            TacInstr::Bin(Name::Temp(2), BinOp::Gte, constant("3"), constant("4")),
        ]);

        let lines = body(compile_lines(&tac));
        assert!(lines.contains(&"__Ltrue0:".to_string()));
        assert!(lines.contains(&"__Ltrue1:".to_string()));
        assert!(lines.contains(&"JGE __Ltrue1".to_string()));
    }

    #[test]
    fn variable_comparison_operand_is_staged_through_r_cmp() {
        let tac = listing(vec![TacInstr::Bin(
            Name::Temp(1),
            BinOp::Eq,
            constant("1"),
            var("b"),
        )]);

        assert_eq!(
            vec![
                "MOV r1, 1",
                "MOV r_cmp, b",
                "CMP r1, r_cmp",
                "JE __Ltrue0",
                "MOV r1, 0",
                "JMP __Lend0",
                "__Ltrue0:",
                "MOV r1, 1",
                "__Lend0:",
            ],
            body(compile_lines(&tac))
        );
    }

    #[test]
    fn binary_operation_into_a_variable_goes_through_r_tmp() {
        let tac = listing(vec![TacInstr::Bin(
            Name::Var("x".to_string()),
            BinOp::Mul,
            var("x"),
            constant("2"),
        )]);

        assert_eq!(
            vec!["MOV r_tmp, x", "MUL r_tmp, 2", "MOV x, r_tmp"],
            body(compile_lines(&tac))
        );
    }

    #[test]
    fn relational_operation_into_a_variable_is_not_expanded() {
        // Preserved quirk: only the staged copy survives in this shape.
        let tac = listing(vec![TacInstr::Bin(
            Name::Var("x".to_string()),
            BinOp::Lt,
            var("a"),
            constant("2"),
        )]);

        assert_eq!(
            vec!["MOV r_tmp, a", "MOV x, r_tmp"],
            body(compile_lines(&tac))
        );
    }

    #[test]
    fn constant_false_branch_is_elided() {
        let tac = listing(vec![TacInstr::IfGoto(
            constant("0"),
            crate::il::Label::new(1),
        )]);

        assert!(body(compile_lines(&tac)).is_empty());
    }

    #[test]
    fn constant_true_branch_becomes_an_unconditional_jump() {
        let tac = listing(vec![TacInstr::IfGoto(
            constant("1"),
            crate::il::Label::new(1),
        )]);

        assert_eq!(vec!["JMP L1"], body(compile_lines(&tac)));
    }

    #[test]
    fn temporary_condition_compares_its_register_to_zero() {
        let tac = listing(vec![
            TacInstr::Copy(Name::Temp(1), constant("1")),
            TacInstr::IfGoto(temp(1), crate::il::Label::new(2)),
        ]);

        assert_eq!(
            vec!["MOV r1, 1", "CMP r1, 0", "JNE L2"],
            body(compile_lines(&tac))
        );
    }

    #[test]
    fn variable_condition_is_staged_through_r_load() {
        let tac = listing(vec![TacInstr::IfGoto(var("a"), crate::il::Label::new(1))]);

        assert_eq!(
            vec!["MOV r_load, a", "CMP r_load, 0", "JNE L1"],
            body(compile_lines(&tac))
        );
    }

    #[test]
    fn labels_and_gotos_lower_verbatim() {
        let tac = listing(vec![
            TacInstr::Label(crate::il::Label::new(1)),
            TacInstr::Goto(crate::il::Label::new(2)),
        ]);

        assert_eq!(vec!["L1:", "JMP L2"], body(compile_lines(&tac)));
    }

    #[test]
    fn return_without_a_value_yields_zero() {
        let tac = listing(vec![TacInstr::Return(None)]);

        assert_eq!(vec!["MOV ret, 0", "RETURN"], body(compile_lines(&tac)));
    }

    #[test]
    fn end_to_end_constant_expression_compiles_without_arithmetic() {
        let tokens =
            lex("int main() { int a = 2; int b = 3; int c = a + b * 0; return c; }").unwrap();
        let program = parse(&tokens).unwrap();
        verify_well_typed(&program).unwrap();
        let tac = il::optimise(il::generate(&program));

        let lines = compile_lines(&tac);
        assert_eq!(
            vec![
                "; --- generated pseudo-assembly ---",
                "; Variables (memory):",
                "; var: a",
                "; var: b",
                "; var: c",
                "",
                "MOV a, 2",
                "MOV b, 3",
                "MOV c, a",
                "MOV ret, c",
                "RETURN",
                "",
                "; --- end of generated assembly ---",
            ],
            lines
        );
    }

    #[test]
    fn end_to_end_branching_program_compiles() {
        let tokens = lex(
            "int main() { int a = 4; int b = 0; if (a > 3) { b = 1; } else { b = 2; } return b; }",
        )
        .unwrap();
        let program = parse(&tokens).unwrap();
        verify_well_typed(&program).unwrap();
        let tac = il::optimise(il::generate(&program));

        let lines = body(compile_lines(&tac));
        assert_eq!(
            vec![
                "MOV a, 4",
                "MOV b, 0",
                "MOV r1, a",
                "CMP r1, 3",
                "JG __Ltrue0",
                "MOV r1, 0",
                "JMP __Lend0",
                "__Ltrue0:",
                "MOV r1, 1",
                "__Lend0:",
                "CMP r1, 0",
                "JNE L1",
                "JMP L2",
                "L1:",
                "MOV b, 1",
                "JMP L3",
                "L2:",
                "MOV b, 2",
                "L3:",
                "MOV ret, b",
                "RETURN",
            ],
            lines
        );
    }
}
