use std::collections::HashMap;

use crate::{ast::*, span::Span};

use super::error::*;

/// Verify that a program declares its variables before use and only
/// assigns expressions of matching type. All errors are collected.
pub fn verify_well_typed(program: &Program) -> Result<(), Vec<TypeError>> {
    let mut checker = TypeChecker::new();
    checker.check_block(&program.function.body);

    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

struct TypeChecker {
    symbol_table: HashMap<String, TypeSpec>,
    errors: Vec<TypeError>,
}

impl TypeChecker {
    fn new() -> Self {
        Self {
            symbol_table: HashMap::new(),
            errors: vec![],
        }
    }

    fn check_block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.check_statement(statement);
        }
    }

    fn check_statement(&mut self, statement: &Statement) {
        let span = statement.span;
        match &statement.stmt_kind {
            StmtKind::Decl(decl) => self.check_decl(decl, span),
            StmtKind::Assign(assign) => self.check_assign(assign, span),
            StmtKind::If(if_stmt) => {
                self.expr_type(&if_stmt.condition);
                self.check_statement(&if_stmt.then_branch);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.check_statement(else_branch);
                }
            }
            StmtKind::Return(ret) => {
                self.expr_type(&ret.value);
            }
            StmtKind::Block(block) => self.check_block(block),
        }
    }

    /// Record a declaration, rejecting duplicates, and verify its
    /// initializer against the declared type.
    fn check_decl(&mut self, decl: &Decl, span: Span) {
        if self.symbol_table.contains_key(&decl.name) {
            self.error(TypeErrorKind::Redeclaration(decl.name.clone()), span);
        } else {
            self.symbol_table.insert(decl.name.clone(), decl.type_spec);
        }

        if let Some(initializer) = &decl.initializer {
            if let Some(expr_type) = self.expr_type(initializer) {
                if expr_type != decl.type_spec {
                    self.error(
                        TypeErrorKind::Assign(decl.type_spec, expr_type),
                        initializer.span,
                    );
                }
            }
        }
    }

    /// Assignment requires exact type equality; there is no implicit
    /// promotion between int and float.
    fn check_assign(&mut self, assign: &Assign, span: Span) {
        let target_type = self.symbol_table.get(&assign.target).copied();
        if target_type.is_none() {
            self.error(TypeErrorKind::UnknownIdentifier(assign.target.clone()), span);
        }

        let value_type = self.expr_type(&assign.value);

        if let (Some(target_type), Some(value_type)) = (target_type, value_type) {
            if target_type != value_type {
                self.error(
                    TypeErrorKind::Assign(target_type, value_type),
                    assign.value.span,
                );
            }
        }
    }

    /// Infer the type of an expression, reporting any undeclared
    /// variables it mentions. Returns `None` if the type is unknown
    /// because of an earlier error.
    fn expr_type(&mut self, expr: &Expr) -> Option<TypeSpec> {
        match &expr.expr_kind {
            ExprKind::Number(text) => Some(if text.contains('.') {
                TypeSpec::Float
            } else {
                TypeSpec::Int
            }),
            ExprKind::Var(name) => {
                let type_spec = self.symbol_table.get(name).copied();
                if type_spec.is_none() {
                    self.error(TypeErrorKind::UnknownIdentifier(name.clone()), expr.span);
                }
                type_spec
            }
            ExprKind::Binary(bin) => {
                let lhs = self.expr_type(&bin.lhs);
                let rhs = self.expr_type(&bin.rhs);
                // A mixed int/float operation widens to float, for
                // relational operators as well as arithmetic ones.
                match (lhs?, rhs?) {
                    (TypeSpec::Float, _) | (_, TypeSpec::Float) => Some(TypeSpec::Float),
                    _ => Some(TypeSpec::Int),
                }
            }
        }
    }

    fn error(&mut self, kind: TypeErrorKind, span: Span) {
        self.errors.push(TypeError::new(kind, span));
    }
}

#[cfg(test)]
mod tests {
    use crate::{lexer::lex, parser::parse};

    use super::*;

    fn check(source: &str) -> Result<(), Vec<TypeError>> {
        let tokens = lex(source).unwrap();
        let program = parse(&tokens).unwrap();
        verify_well_typed(&program)
    }

    macro_rules! assert_type_error {
        ($source:expr, $kind:pat) => {{
            let errors = check($source).unwrap_err();
            assert!(
                errors.iter().any(|error| matches!(error.kind(), $kind)),
                "expected a matching type error, got {:?}",
                errors
            );
        }};
    }

    #[test]
    fn well_typed_program_passes() {
        assert!(check("int main() { int a = 2; int b = a + 1; return b; }").is_ok());
    }

    #[test]
    fn use_before_declaration_is_reported() {
        assert_type_error!(
            "int main() { return x; }",
            TypeErrorKind::UnknownIdentifier(_)
        );
    }

    #[test]
    fn redeclaration_is_reported() {
        assert_type_error!(
            "int main() { int a = 1; float a = 2.0; return a; }",
            TypeErrorKind::Redeclaration(_)
        );
    }

    #[test]
    fn float_initializer_for_int_variable_is_reported() {
        assert_type_error!(
            "int main() { int a = 2.5; return a; }",
            TypeErrorKind::Assign(TypeSpec::Int, TypeSpec::Float)
        );
    }

    #[test]
    fn mixed_arithmetic_widens_to_float() {
        assert_type_error!(
            "int main() { float f = 1.0; int a = 2; int b = a + f; return b; }",
            TypeErrorKind::Assign(TypeSpec::Int, TypeSpec::Float)
        );
    }

    #[test]
    fn all_errors_are_collected() {
        let errors = check("int main() { x = 1; y = 2; }").unwrap_err();
        assert_eq!(2, errors.len());
    }
}
