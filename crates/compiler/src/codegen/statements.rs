//! Statement and declaration emission.
//!
//! Walks the program in source order: declarations populate the type
//! registry as they emit, scopes mangle their members and give private ones
//! `static` storage, and functions push a parameter frame for the duration
//! of their body. Pending temp declarations drain at each statement
//! boundary. Comments from the token stream are replayed ahead of each
//! top-level declaration.

use std::fmt::Write as _;

use crate::ast::{
    BitmapDecl, CallbackDecl, Decl, EnumDecl, Expr, FunctionDecl, Program, RegisterDecl, ScopeDecl,
    Stmt, StructDecl, TokenStream, VarDecl, Visibility,
};
use crate::codegen::CodegenState;
use crate::config::GenOptions;
use crate::diagnostics::{CodegenError, Diagnostic, GenResult};
use crate::resolver::{validate_literal_fits_type, validate_type_conversion};
use crate::symbols::{base_type_token, string_capacity_of};
use crate::types::{ParameterInfo, TypeInfo};
use crate::validate::{validate_critical_body, validate_include};

const INDENT: &str = "    ";

impl CodegenState {
    /// Emit the body of the translation unit (everything below the
    /// prelude). Rule violations are collected per declaration; internal
    /// errors propagate.
    pub fn emit_translation_unit(
        &mut self,
        program: &Program,
        tokens: &TokenStream,
        options: &GenOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> GenResult<String> {
        let mut out = String::new();
        for decl in &program.declarations {
            self.replay_comments(tokens, decl_line(decl), &mut out);
            match self.emit_declaration(decl, options, diagnostics) {
                Ok(text) => {
                    if !text.is_empty() {
                        out.push_str(&text);
                    }
                }
                Err(CodegenError::Rule(d)) => diagnostics.push(d),
                Err(other) => return Err(other),
            }
        }
        Ok(out)
    }

    fn replay_comments(&mut self, tokens: &TokenStream, line: usize, out: &mut String) {
        let (comments, cursor) = tokens.comments_before(self.comment_cursor, line);
        for comment in comments {
            out.push_str(&comment.text);
            out.push('\n');
        }
        self.comment_cursor = cursor;
    }

    fn emit_declaration(
        &mut self,
        decl: &Decl,
        options: &GenOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> GenResult<String> {
        match decl {
            Decl::Include(include) => {
                validate_include(include, &options.source_path, &options.include_paths)?;
                self.user_includes
                    .push(format!("#include \"{}\"", include.path));
                Ok(String::new())
            }
            Decl::Variable(var) => self.emit_global_variable(var, var.name.clone(), false),
            Decl::Struct(decl) => self.emit_struct_decl(decl),
            Decl::Enum(decl) => Ok(self.emit_enum_decl(decl, None)),
            Decl::Bitmap(decl) => self.emit_bitmap_decl(decl, None),
            Decl::Register(decl) => self.emit_register_decl(decl, None),
            Decl::Callback(decl) => self.emit_callback_decl(decl),
            Decl::Function(decl) => self.emit_function(decl, false, "", diagnostics),
            Decl::Scope(decl) => self.emit_scope(decl, options, diagnostics),
        }
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    fn emit_scope(
        &mut self,
        scope: &ScopeDecl,
        options: &GenOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> GenResult<String> {
        self.enter_scope(&scope.name);
        // Member variables register before any body emits, so scope
        // functions can reference members declared below them
        for member in &scope.members {
            if let Decl::Variable(var) = &member.decl {
                let mangled = format!("{}_{}", scope.name, var.name);
                let info = TypeInfo::from_decl(var, &self.symbols);
                self.type_registry.insert(mangled, info);
            }
        }

        // A private member the resolver proved is written by exactly one
        // function hoists into that function as a local static
        let mut hoisted: std::collections::HashMap<String, String> = std::collections::HashMap::new();
        for member in &scope.members {
            if member.visibility != Visibility::Private {
                continue;
            }
            if let Decl::Variable(var) = &member.decl {
                let mangled = format!("{}_{}", scope.name, var.name);
                if let Some(writer) = self.symbols.member_single_function.get(&mangled).cloned() {
                    let text = self.emit_global_variable(var, mangled, true)?;
                    hoisted.entry(writer).or_default().push_str(&text);
                }
            }
        }

        let mut out = String::new();
        for member in &scope.members {
            let is_private = member.visibility == Visibility::Private;
            let result = match &member.decl {
                Decl::Variable(var) => {
                    let mangled = format!("{}_{}", scope.name, var.name);
                    if self.symbols.member_single_function.contains_key(&mangled) && is_private {
                        Ok(String::new())
                    } else {
                        self.emit_global_variable(var, mangled, is_private)
                    }
                }
                Decl::Function(func) => {
                    let mangled = format!("{}_{}", scope.name, func.name);
                    let locals = hoisted.remove(&mangled).unwrap_or_default();
                    self.emit_scoped_function(func, is_private, &locals, diagnostics)
                }
                Decl::Enum(decl) => Ok(self.emit_enum_decl(decl, Some(&scope.name))),
                Decl::Bitmap(decl) => self.emit_bitmap_decl(decl, Some(&scope.name)),
                Decl::Register(decl) => self.emit_register_decl(decl, Some(&scope.name)),
                Decl::Struct(decl) => self.emit_struct_decl(decl),
                Decl::Callback(decl) => self.emit_callback_decl(decl),
                Decl::Include(_) | Decl::Scope(_) => Err(CodegenError::Internal(
                    "nested scopes and scoped includes are resolved by the frontend".to_string(),
                )),
            };
            match result {
                Ok(text) => out.push_str(&text),
                Err(CodegenError::Rule(d)) => diagnostics.push(d),
                Err(other) => {
                    self.leave_scope();
                    return Err(other);
                }
            }
        }
        self.leave_scope();
        Ok(out)
    }

    fn emit_scoped_function(
        &mut self,
        func: &FunctionDecl,
        is_private: bool,
        hoisted_locals: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> GenResult<String> {
        let scope = self
            .current_scope
            .clone()
            .ok_or_else(|| CodegenError::Internal("scoped function outside scope".to_string()))?;
        let mangled = format!("{}_{}", scope, func.name);
        let renamed = FunctionDecl {
            name: mangled,
            ..func.clone()
        };
        self.emit_function(&renamed, is_private, hoisted_locals, diagnostics)
    }

    // =========================================================================
    // Type declarations
    // =========================================================================

    fn emit_struct_decl(&mut self, decl: &StructDecl) -> GenResult<String> {
        let mut out = String::new();
        writeln!(out, "typedef struct {{")?;
        for field in &decl.fields {
            let base = base_type_token(&field.type_name);
            if base == "string" {
                let cap = string_capacity_of(&field.type_name).unwrap_or(0);
                self.needs_string = true;
                if field.array_dims.is_empty() {
                    writeln!(out, "{}char {}[{}];", INDENT, field.name, cap + 1)?;
                } else {
                    let dims: String = field
                        .array_dims
                        .iter()
                        .map(|d| format!("[{}]", d))
                        .collect();
                    writeln!(out, "{}char {}{}[{}];", INDENT, field.name, dims, cap + 1)?;
                }
                continue;
            }
            let c_ty = self.c_type_text(base);
            let dims: String = field
                .array_dims
                .iter()
                .map(|d| format!("[{}]", d))
                .collect();
            writeln!(out, "{}{} {}{};", INDENT, c_ty, field.name, dims)?;
        }
        writeln!(out, "}} {};\n", decl.name)?;
        Ok(out)
    }

    fn emit_enum_decl(&mut self, decl: &EnumDecl, scope: Option<&str>) -> String {
        let name = match scope {
            Some(scope) => format!("{}_{}", scope, decl.name),
            None => decl.name.clone(),
        };
        let mut out = String::new();
        out.push_str("typedef enum {\n");
        for (i, (variant, value)) in decl.variants.iter().enumerate() {
            let comma = if i + 1 == decl.variants.len() { "" } else { "," };
            out.push_str(&format!("{}{}_{} = {}{}\n", INDENT, name, variant, value, comma));
        }
        out.push_str(&format!("}} {};\n\n", name));
        out
    }

    fn emit_bitmap_decl(&mut self, decl: &BitmapDecl, scope: Option<&str>) -> GenResult<String> {
        let name = match scope {
            Some(scope) => format!("{}_{}", scope, decl.name),
            None => decl.name.clone(),
        };
        let backing = match decl.bit_width {
            8 => "uint8_t",
            16 => "uint16_t",
            32 => "uint32_t",
            64 => "uint64_t",
            other => {
                return Err(CodegenError::Internal(format!(
                    "bitmap '{}' has unsupported width {}",
                    name, other
                )));
            }
        };
        self.needs_stdint = true;
        let mut out = String::new();
        writeln!(out, "typedef {} {};", backing, name)?;
        let mut offset = 0u32;
        for field in &decl.fields {
            writeln!(out, "#define {}_{}_OFFSET {}U", name, field.name, offset)?;
            writeln!(out, "#define {}_{}_WIDTH {}U", name, field.name, field.width)?;
            offset += field.width;
        }
        out.push('\n');
        Ok(out)
    }

    fn emit_register_decl(
        &mut self,
        decl: &RegisterDecl,
        scope: Option<&str>,
    ) -> GenResult<String> {
        let name = match scope {
            Some(scope) => format!("{}_{}", scope, decl.name),
            None => decl.name.clone(),
        };
        self.needs_stdint = true;
        let mut out = String::new();
        for member in &decl.members {
            let c_ty = self.c_type_text(base_type_token(&member.type_name));
            writeln!(
                out,
                "#define {}_{} (*(volatile {} *)(0x{:X} + 0x{:02X}))",
                name, member.name, c_ty, decl.base_address, member.offset
            )?;
        }
        out.push('\n');
        Ok(out)
    }

    fn emit_callback_decl(&mut self, decl: &CallbackDecl) -> GenResult<String> {
        if decl.signature.is_isr() {
            // Interrupt-handler shape aliases the shared ISR typedef
            self.needs_isr = true;
            return Ok(format!("typedef ISR {};\n\n", decl.name));
        }
        let ret = self.c_type_text(base_type_token(&decl.signature.return_type));
        let params: Vec<String> = decl
            .signature
            .params
            .iter()
            .map(|p| {
                let mut text = String::new();
                if p.is_const {
                    text.push_str("const ");
                }
                text.push_str(&self.c_type_text(base_type_token(&p.type_name)));
                if p.is_pointer {
                    text.push_str(" *");
                }
                if p.is_array {
                    text.push_str(" []");
                }
                text
            })
            .collect();
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        Ok(format!("typedef {} (*{})({});\n\n", ret, decl.name, params))
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// File-scope or scope-member variable. Locals go through
    /// [`CodegenState::emit_local_declaration`].
    fn emit_global_variable(
        &mut self,
        decl: &VarDecl,
        emitted_name: String,
        is_private: bool,
    ) -> GenResult<String> {
        let info = TypeInfo::from_decl(decl, &self.symbols);
        self.validate_initializer(decl, &info)?;
        self.type_registry.insert(emitted_name.clone(), info.clone());

        let storage = if is_private { "static " } else { "" };
        let mut text = String::new();
        text.push_str(storage);
        if decl.is_const {
            text.push_str("const ");
        }
        if decl.is_atomic {
            text.push_str("volatile ");
        }
        if info.is_string {
            self.needs_string = true;
            let dims: String = decl.array_dims.iter().map(|d| format!("[{}]", d)).collect();
            text.push_str(&format!(
                "char {}{}[{}]",
                emitted_name,
                dims,
                info.string_capacity + 1
            ));
            if let Some(Expr::StringLiteral(s)) = &decl.initializer {
                text.push_str(&format!(
                    " = \"{}\"",
                    crate::codegen::expressions::escape_c_string(s)
                ));
            }
            text.push_str(";\n");
            return Ok(text);
        }

        let c_ty = self.c_type_text(base_type_token(&decl.type_name));
        let dims: String = decl.array_dims.iter().map(|d| format!("[{}]", d)).collect();
        text.push_str(&format!("{} {}{}", c_ty, emitted_name, dims));
        if let Some(init) = &decl.initializer {
            let init_text = self.emit_expression(init)?;
            text.push_str(&format!(" = {}", init_text));
        }
        text.push_str(";\n");
        Ok(text)
    }

    fn validate_initializer(&self, decl: &VarDecl, info: &TypeInfo) -> GenResult<()> {
        let Some(init) = &decl.initializer else {
            return Ok(());
        };
        if let Expr::IntLiteral { text, .. } = init {
            validate_literal_fits_type(text, &info.base_type, decl.line)?;
        }
        if !info.is_string && !info.is_enum {
            let init_ty = self.expression_type(init);
            validate_type_conversion(&info.base_type, init_ty.as_deref(), decl.line)?;
        }
        Ok(())
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn emit_function(
        &mut self,
        func: &FunctionDecl,
        is_private: bool,
        hoisted_locals: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> GenResult<String> {
        self.begin_function(&func.name);
        self.known_functions.insert(func.name.clone());
        for param in &func.params {
            let mut info = ParameterInfo::from_decl(param, &self.symbols);
            // Parameters the body never writes are emitted const
            if !info.is_const && !body_writes_to(&func.body, &param.name) {
                info.is_const = true;
            }
            self.current_parameters.insert(param.name.clone(), info);
        }

        let signature = self.function_signature(func, is_private)?;
        let mut out = String::new();
        out.push_str(&signature);
        out.push_str(" {\n");
        for line in hoisted_locals.lines() {
            out.push_str(INDENT);
            out.push_str("static ");
            out.push_str(line.trim_start_matches("static "));
            out.push('\n');
        }

        for stmt in &func.body {
            match self.emit_statement(stmt, 1) {
                Ok(text) => out.push_str(&text),
                Err(CodegenError::Rule(d)) => diagnostics.push(d),
                Err(other) => {
                    self.end_function();
                    return Err(other);
                }
            }
        }

        // `void main` still emits `int main(void)` with a success return
        if func.name == "main"
            && !matches!(func.body.last(), Some(Stmt::Return { .. }))
        {
            out.push_str(INDENT);
            out.push_str("return 0;\n");
        }

        out.push_str("}\n\n");
        self.end_function();
        Ok(out)
    }

    fn function_signature(&mut self, func: &FunctionDecl, is_private: bool) -> GenResult<String> {
        if func.name == "main" {
            return Ok(if func.params.len() == 2 {
                "int main(int argc, char *argv[])".to_string()
            } else {
                "int main(void)".to_string()
            });
        }
        let storage = if is_private { "static " } else { "" };
        let ret = self.c_type_text(base_type_token(&func.return_type));
        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            params.push(self.parameter_text(param)?);
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        Ok(format!("{}{} {}({})", storage, ret, func.name, params))
    }

    fn parameter_text(&mut self, param: &crate::ast::ParamDecl) -> GenResult<String> {
        let info = self
            .current_parameters
            .get(&param.name)
            .cloned()
            .unwrap_or_else(|| ParameterInfo::from_decl(param, &self.symbols));
        let mut text = String::new();
        if info.is_const {
            text.push_str("const ");
        }
        if info.is_string {
            self.needs_string = true;
            text.push_str(&format!("char {}[]", param.name));
            return Ok(text);
        }
        let base = base_type_token(&param.type_name);
        if info.is_callback {
            if self
                .symbols
                .callbacks
                .get(base)
                .is_some_and(|sig| sig.is_isr())
            {
                self.needs_isr = true;
                text.push_str(&format!("ISR {}", param.name));
                return Ok(text);
            }
            text.push_str(&format!("{} {}", base, param.name));
            return Ok(text);
        }
        let c_ty = self.c_type_text(base);
        if info.is_array {
            let mut dims = String::from("[]");
            for d in param.array_dims.iter().skip(1) {
                dims.push_str(&format!("[{}]", d));
            }
            text.push_str(&format!("{} {}{}", c_ty, param.name, dims));
            return Ok(text);
        }
        if info.is_struct || info.by_ref {
            text.push_str(&format!("{} *{}", c_ty, param.name));
            return Ok(text);
        }
        text.push_str(&format!("{} {}", c_ty, param.name));
        Ok(text)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(crate) fn emit_statement(&mut self, stmt: &Stmt, depth: usize) -> GenResult<String> {
        let indent = INDENT.repeat(depth);
        match stmt {
            Stmt::Declaration(decl) => self.emit_local_declaration(decl, &indent),
            Stmt::Assign(assign) => {
                self.current_line = assign.line;
                let body = match self.try_emit_float_bit_assignment(assign)? {
                    Some(text) => text,
                    None => {
                        let (kind, ctx) = self.classify_assignment(assign)?;
                        self.emit_assignment(kind, &ctx)?
                    }
                };
                Ok(self.with_pending_temps(&body, &indent))
            }
            Stmt::Expression { expr, line } => {
                self.current_line = *line;
                let text = self.emit_expression(expr)?;
                Ok(self.with_pending_temps(&format!("{};", text), &indent))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                line,
            } => {
                self.current_line = *line;
                self.validate_no_call_in_condition(cond, "if", *line)?;
                let cond_text = self.emit_expression(cond)?;
                let mut out = format!("{}if ({}) {{\n", indent, strip_outer_parens(&cond_text));
                for stmt in then_branch {
                    out.push_str(&self.emit_statement(stmt, depth + 1)?);
                }
                if let Some(else_branch) = else_branch {
                    out.push_str(&format!("{}}} else {{\n", indent));
                    for stmt in else_branch {
                        out.push_str(&self.emit_statement(stmt, depth + 1)?);
                    }
                }
                out.push_str(&format!("{}}}\n", indent));
                Ok(out)
            }
            Stmt::While { cond, body, line } => {
                self.current_line = *line;
                self.validate_no_call_in_condition(cond, "while", *line)?;
                let cond_text = self.emit_expression(cond)?;
                let mut out = format!("{}while ({}) {{\n", indent, strip_outer_parens(&cond_text));
                for stmt in body {
                    out.push_str(&self.emit_statement(stmt, depth + 1)?);
                }
                out.push_str(&format!("{}}}\n", indent));
                Ok(out)
            }
            Stmt::DoWhile { body, cond, line } => {
                self.current_line = *line;
                self.validate_no_call_in_condition(cond, "do-while", *line)?;
                self.validate_boolean_condition(cond, "do-while", *line)?;
                let mut out = format!("{}do {{\n", indent);
                for stmt in body {
                    out.push_str(&self.emit_statement(stmt, depth + 1)?);
                }
                let cond_text = self.emit_expression(cond)?;
                out.push_str(&format!(
                    "{}}} while ({});\n",
                    indent,
                    strip_outer_parens(&cond_text)
                ));
                Ok(out)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                line,
            } => {
                self.current_line = *line;
                if let Some(cond) = cond {
                    self.validate_no_call_in_condition(cond, "for", *line)?;
                }
                let init_text = match init {
                    Some(stmt) => self.clause_text(stmt)?,
                    None => ";".to_string(),
                };
                let cond_text = match cond {
                    Some(cond) => strip_outer_parens(&self.emit_expression(cond)?).to_string(),
                    None => String::new(),
                };
                let step_text = match step {
                    Some(stmt) => self.clause_text(stmt)?.trim_end_matches(';').to_string(),
                    None => String::new(),
                };
                let mut out = format!(
                    "{}for ({} {}; {}) {{\n",
                    indent, init_text, cond_text, step_text
                );
                for stmt in body {
                    out.push_str(&self.emit_statement(stmt, depth + 1)?);
                }
                out.push_str(&format!("{}}}\n", indent));
                Ok(out)
            }
            Stmt::Switch(switch) => self.emit_switch(switch, depth),
            Stmt::Critical { body, line } => {
                self.current_line = *line;
                validate_critical_body(body, *line)?;
                self.needs_cmsis = true;
                let mut out = format!("{}__disable_irq();\n", indent);
                for stmt in body {
                    out.push_str(&self.emit_statement(stmt, depth)?);
                }
                out.push_str(&format!("{}__enable_irq();\n", indent));
                Ok(out)
            }
            Stmt::Return { value, line } => {
                self.current_line = *line;
                match value {
                    Some(value) => {
                        let text = self.emit_expression(value)?;
                        Ok(format!("{}return {};\n", indent, text))
                    }
                    None => Ok(format!("{}return;\n", indent)),
                }
            }
            Stmt::Break { .. } => Ok(format!("{}break;\n", indent)),
            Stmt::Continue { .. } => Ok(format!("{}continue;\n", indent)),
            Stmt::Block(body) => {
                let mut out = format!("{}{{\n", indent);
                for stmt in body {
                    out.push_str(&self.emit_statement(stmt, depth + 1)?);
                }
                out.push_str(&format!("{}}}\n", indent));
                Ok(out)
            }
        }
    }

    /// A single-clause rendering of a statement for `for(...)` headers.
    fn clause_text(&mut self, stmt: &Stmt) -> GenResult<String> {
        let text = self.emit_statement(stmt, 0)?;
        Ok(text.trim().replace('\n', " "))
    }

    /// Pending temp declarations emit at the statement boundary, above the
    /// statement that queued them.
    fn with_pending_temps(&mut self, body: &str, indent: &str) -> String {
        let temps = self.take_pending_temps();
        self.float_shadow_current.clear();
        let mut out = String::new();
        for temp in temps {
            out.push_str(indent);
            out.push_str(&temp);
            out.push('\n');
        }
        for line in body.lines() {
            out.push_str(indent);
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn emit_local_declaration(&mut self, decl: &VarDecl, indent: &str) -> GenResult<String> {
        let info = TypeInfo::from_decl(decl, &self.symbols);
        self.validate_initializer(decl, &info)?;
        self.type_registry.insert(decl.name.clone(), info.clone());
        if info.is_array {
            self.local_arrays.insert(decl.name.clone());
        } else {
            self.local_variables.insert(decl.name.clone());
        }

        if info.is_string {
            self.needs_string = true;
            let dims: String = decl.array_dims.iter().map(|d| format!("[{}]", d)).collect();
            let mut out = format!(
                "{}char {}{}[{}];\n",
                indent,
                decl.name,
                dims,
                info.string_capacity + 1
            );
            if let Some(Expr::StringLiteral(s)) = &decl.initializer {
                let cap = info.string_capacity;
                out.push_str(&format!(
                    "{}strncpy({}, \"{}\", {});\n",
                    indent,
                    decl.name,
                    crate::codegen::expressions::escape_c_string(s),
                    cap
                ));
                out.push_str(&format!("{}{}[{}] = '\\0';\n", indent, decl.name, cap));
            }
            return Ok(out);
        }

        let mut text = String::new();
        if decl.is_const {
            text.push_str("const ");
        }
        if decl.is_atomic {
            text.push_str("volatile ");
        }
        let c_ty = self.c_type_text(base_type_token(&decl.type_name));
        let dims: String = decl.array_dims.iter().map(|d| format!("[{}]", d)).collect();
        text.push_str(&format!("{} {}{}", c_ty, decl.name, dims));
        if let Some(init) = &decl.initializer {
            let init_text = self.emit_expression(init)?;
            text.push_str(&format!(" = {}", init_text));
        }
        text.push(';');
        Ok(self.with_pending_temps(&text, indent))
    }

    fn emit_switch(&mut self, switch: &crate::ast::SwitchStmt, depth: usize) -> GenResult<String> {
        self.current_line = switch.line;
        self.validate_switch(switch)?;
        let indent = INDENT.repeat(depth);
        let inner = INDENT.repeat(depth + 1);
        let value = self.emit_expression(&switch.value)?;
        let mut out = format!("{}switch ({}) {{\n", indent, strip_outer_parens(&value));
        for case in &switch.cases {
            for label in &case.labels {
                let label_text = self.emit_expression(label)?;
                out.push_str(&format!("{}case {}:\n", inner, label_text));
            }
            for stmt in &case.body {
                out.push_str(&self.emit_statement(stmt, depth + 2)?);
            }
            if !ends_in_jump(&case.body) {
                out.push_str(&format!("{}{}break;\n", inner, INDENT));
            }
        }
        if let Some(default) = &switch.default {
            out.push_str(&format!("{}default:\n", inner));
            for stmt in &default.body {
                out.push_str(&self.emit_statement(stmt, depth + 2)?);
            }
            if !ends_in_jump(&default.body) {
                out.push_str(&format!("{}{}break;\n", inner, INDENT));
            }
        }
        out.push_str(&format!("{}}}\n", indent));
        Ok(out)
    }
}

fn ends_in_jump(body: &[Stmt]) -> bool {
    matches!(body.last(), Some(Stmt::Return { .. }) | Some(Stmt::Break { .. }))
}

/// Conditions emitted from binary expressions come parenthesized; the
/// surrounding `if (...)` supplies its own.
fn strip_outer_parens(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        // Only strip when the parens match each other
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut depth = 0i32;
        for c in inner.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return trimmed;
                    }
                }
                _ => {}
            }
        }
        if depth == 0 {
            return inner;
        }
    }
    trimmed
}

fn decl_line(decl: &Decl) -> usize {
    match decl {
        Decl::Include(d) => d.line,
        Decl::Variable(d) => d.line,
        Decl::Struct(d) => d.line,
        Decl::Enum(d) => d.line,
        Decl::Bitmap(d) => d.line,
        Decl::Register(d) => d.line,
        Decl::Callback(d) => d.line,
        Decl::Function(d) => d.line,
        Decl::Scope(d) => d.line,
    }
}

/// Does the body assign through `name`? Drives const-parameter inference.
fn body_writes_to(body: &[Stmt], name: &str) -> bool {
    body.iter().any(|stmt| stmt_writes_to(stmt, name))
}

fn stmt_writes_to(stmt: &Stmt, name: &str) -> bool {
    match stmt {
        Stmt::Assign(assign) => target_root(&assign.target) == Some(name),
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            body_writes_to(then_branch, name)
                || else_branch
                    .as_ref()
                    .is_some_and(|b| body_writes_to(b, name))
        }
        Stmt::While { body, .. }
        | Stmt::DoWhile { body, .. }
        | Stmt::Critical { body, .. }
        | Stmt::Block(body) => body_writes_to(body, name),
        Stmt::For {
            init, step, body, ..
        } => {
            init.as_deref().is_some_and(|s| stmt_writes_to(s, name))
                || step.as_deref().is_some_and(|s| stmt_writes_to(s, name))
                || body_writes_to(body, name)
        }
        Stmt::Switch(switch) => {
            switch.cases.iter().any(|c| body_writes_to(&c.body, name))
                || switch
                    .default
                    .as_ref()
                    .is_some_and(|d| body_writes_to(&d.body, name))
        }
        _ => false,
    }
}

fn target_root(e: &Expr) -> Option<&str> {
    match e {
        Expr::Identifier(name) => Some(name),
        Expr::Member { base, .. } => target_root(base),
        Expr::Index { base, .. } | Expr::Range { base, .. } => target_root(base),
        Expr::Paren(inner) => target_root(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp, AssignStmt, ParamDecl};
    use crate::config::{Mode, TargetCapabilities};
    use crate::symbols::SymbolInfo;

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    fn var(name: &str, ty: &str, init: Option<Expr>) -> VarDecl {
        VarDecl {
            name: name.to_string(),
            type_name: ty.to_string(),
            is_const: false,
            is_atomic: false,
            overflow: crate::ast::OverflowBehavior::None,
            array_dims: vec![],
            string_capacity: None,
            initializer: init,
            line: 1,
        }
    }

    fn function(name: &str, params: Vec<ParamDecl>, body: Vec<Stmt>) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            return_type: "void".to_string(),
            params,
            body,
            line: 1,
        }
    }

    #[test]
    fn test_main_normalization() {
        let mut cg = state();
        let mut diags = Vec::new();
        let out = cg
            .emit_function(&function("main", vec![], vec![]), false, "", &mut diags)
            .unwrap();
        assert!(out.starts_with("int main(void) {"));
        assert!(out.contains("return 0;"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_const_parameter_inference() {
        let mut cg = state();
        let mut diags = Vec::new();
        let read_only = ParamDecl {
            name: "limit".to_string(),
            type_name: "u8".to_string(),
            is_const: false,
            array_dims: vec![],
            string_capacity: None,
            by_ref: false,
        };
        let written = ParamDecl {
            name: "count".to_string(),
            type_name: "u8".to_string(),
            is_const: false,
            array_dims: vec![],
            string_capacity: None,
            by_ref: false,
        };
        let body = vec![Stmt::Assign(AssignStmt {
            target: Expr::ident("count"),
            op: AssignOp::Add,
            value: Expr::int("1"),
            line: 2,
        })];
        let out = cg
            .emit_function(
                &function("tick", vec![read_only, written], body),
                false,
                "",
                &mut diags,
            )
            .unwrap();
        assert!(out.contains("const uint8_t limit"));
        assert!(out.contains("uint8_t count"));
        assert!(!out.contains("const uint8_t count"));
    }

    #[test]
    fn test_scope_member_mangling_and_static_storage() {
        // Property 7: Scope.member emits Scope_member; private members are
        // static
        let mut cg = state();
        cg.symbols.scopes.insert("Motor".to_string());
        let mut diags = Vec::new();
        let scope = ScopeDecl {
            name: "Motor".to_string(),
            members: vec![
                crate::ast::ScopeMember {
                    visibility: Visibility::Public,
                    decl: Decl::Variable(var("speed", "u16", Some(Expr::int("0")))),
                },
                crate::ast::ScopeMember {
                    visibility: Visibility::Private,
                    decl: Decl::Variable(var("state", "u8", None)),
                },
                crate::ast::ScopeMember {
                    visibility: Visibility::Private,
                    decl: Decl::Function(function(
                        "step",
                        vec![],
                        vec![Stmt::Assign(AssignStmt {
                            target: Expr::Member {
                                base: Box::new(Expr::This),
                                member: "speed".to_string(),
                            },
                            op: AssignOp::Set,
                            value: Expr::int("1"),
                            line: 3,
                        })],
                    )),
                },
            ],
            line: 1,
        };
        let opts = GenOptions::new("app.cnx");
        let out = cg.emit_scope(&scope, &opts, &mut diags).unwrap();
        assert!(out.contains("uint16_t Motor_speed = 0;"));
        assert!(out.contains("static uint8_t Motor_state;"));
        assert!(out.contains("static void Motor_step(void) {"));
        assert!(out.contains("Motor_speed = 1;"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_single_writer_member_hoists_into_function() {
        let mut cg = state();
        cg.symbols.scopes.insert("Ticker".to_string());
        cg.symbols
            .member_single_function
            .insert("Ticker_count".to_string(), "Ticker_step".to_string());
        let mut diags = Vec::new();
        let scope = ScopeDecl {
            name: "Ticker".to_string(),
            members: vec![
                crate::ast::ScopeMember {
                    visibility: Visibility::Private,
                    decl: Decl::Variable(var("count", "u32", Some(Expr::int("0")))),
                },
                crate::ast::ScopeMember {
                    visibility: Visibility::Public,
                    decl: Decl::Function(function(
                        "step",
                        vec![],
                        vec![Stmt::Assign(AssignStmt {
                            target: Expr::Member {
                                base: Box::new(Expr::This),
                                member: "count".to_string(),
                            },
                            op: AssignOp::Add,
                            value: Expr::int("1"),
                            line: 2,
                        })],
                    )),
                },
            ],
            line: 1,
        };
        let opts = GenOptions::new("app.cnx");
        let out = cg.emit_scope(&scope, &opts, &mut diags).unwrap();
        // The member lives inside its single writer, not at file scope
        let func_start = out.find("void Ticker_step(void) {").unwrap();
        let decl_pos = out.find("static uint32_t Ticker_count = 0;").unwrap();
        assert!(decl_pos > func_start);
        assert!(out.contains("Ticker_count += 1;"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_critical_section_emission() {
        let mut cg = state();
        cg.type_registry
            .insert("x".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("x".to_string());
        let stmt = Stmt::Critical {
            body: vec![Stmt::Assign(AssignStmt {
                target: Expr::ident("x"),
                op: AssignOp::Set,
                value: Expr::int("1"),
                line: 2,
            })],
            line: 1,
        };
        let out = cg.emit_statement(&stmt, 1).unwrap();
        assert!(out.contains("__disable_irq();"));
        assert!(out.contains("x = 1;"));
        assert!(out.contains("__enable_irq();"));
        assert!(cg.needs_cmsis);
    }

    #[test]
    fn test_critical_section_return_rejected() {
        let mut cg = state();
        let stmt = Stmt::Critical {
            body: vec![Stmt::Return {
                value: None,
                line: 2,
            }],
            line: 1,
        };
        assert!(cg.emit_statement(&stmt, 1).is_err());
    }

    #[test]
    fn test_local_string_declaration_bounded() {
        // Scenario A shape: string<32> s <- "hi";
        let mut cg = state();
        let mut decl = var("s", "string", Some(Expr::StringLiteral("hi".to_string())));
        decl.string_capacity = Some(32);
        let out = cg.emit_statement(&Stmt::Declaration(decl), 1).unwrap();
        assert!(out.contains("char s[33];"));
        assert!(out.contains("strncpy(s, \"hi\", 32);"));
        assert!(out.contains("s[32] = '\\0';"));
        assert!(cg.needs_string);
    }

    #[test]
    fn test_enum_emission() {
        let mut cg = state();
        let decl = EnumDecl {
            name: "Color".to_string(),
            variants: vec![("RED".to_string(), 0), ("GREEN".to_string(), 1)],
            line: 1,
        };
        let out = cg.emit_enum_decl(&decl, None);
        assert!(out.contains("typedef enum {"));
        assert!(out.contains("Color_RED = 0,"));
        assert!(out.contains("Color_GREEN = 1"));
        assert!(out.contains("} Color;"));
    }

    #[test]
    fn test_bitmap_emission() {
        let mut cg = state();
        let decl = BitmapDecl {
            name: "Flags".to_string(),
            bit_width: 8,
            fields: vec![
                crate::ast::BitmapField {
                    name: "Ready".to_string(),
                    width: 1,
                },
                crate::ast::BitmapField {
                    name: "Mode".to_string(),
                    width: 3,
                },
            ],
            line: 1,
        };
        let out = cg.emit_bitmap_decl(&decl, None).unwrap();
        assert!(out.contains("typedef uint8_t Flags;"));
        assert!(out.contains("#define Flags_Ready_OFFSET 0U"));
        assert!(out.contains("#define Flags_Ready_WIDTH 1U"));
        assert!(out.contains("#define Flags_Mode_OFFSET 1U"));
        assert!(out.contains("#define Flags_Mode_WIDTH 3U"));
    }

    #[test]
    fn test_register_macro_emission() {
        let mut cg = state();
        let decl = RegisterDecl {
            name: "GPIO7".to_string(),
            base_address: 0x401B_8000,
            members: vec![crate::ast::RegisterMemberDecl {
                name: "DR".to_string(),
                offset: 0x0,
                access: crate::symbols::AccessMode::Rw,
                type_name: "u32".to_string(),
            }],
            line: 1,
        };
        let out = cg.emit_register_decl(&decl, None).unwrap();
        assert!(out.contains(
            "#define GPIO7_DR (*(volatile uint32_t *)(0x401B8000 + 0x00))"
        ));
    }

    #[test]
    fn test_switch_emission_with_fallthrough_protection() {
        let mut cg = state();
        cg.type_registry
            .insert("x".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("x".to_string());
        let switch = crate::ast::SwitchStmt {
            value: Expr::ident("x"),
            cases: vec![crate::ast::SwitchCase {
                labels: vec![Expr::int("1"), Expr::int("2")],
                body: vec![],
                line: 2,
            }],
            default: Some(crate::ast::DefaultCase {
                expected_remaining: None,
                body: vec![],
                line: 3,
            }),
            line: 1,
        };
        let out = cg.emit_statement(&Stmt::Switch(switch), 0).unwrap();
        assert!(out.contains("switch (x) {"));
        assert!(out.contains("case 1:"));
        assert!(out.contains("case 2:"));
        assert!(out.contains("default:"));
        assert_eq!(out.matches("break;").count(), 2);
    }
}
