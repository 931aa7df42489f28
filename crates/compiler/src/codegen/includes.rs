//! Prelude assembly.
//!
//! Converts the run's need-flags and helper-usage sets into the fixed-order
//! block at the top of the translation unit: includes, user includes, the
//! ISR typedef, float static asserts, then clamp and safe-divide helper
//! definitions. Helper sets are ordered, so output is reproducible.

use crate::codegen::CodegenState;
use crate::config::Mode;
use crate::resolver::{c_primitive_name, is_signed_type, type_bit_width};

impl CodegenState {
    /// Build the prelude block from the collected need-flags.
    pub fn emit_prelude(&self) -> String {
        let mut out = String::new();
        if self.needs_stdint {
            out.push_str("#include <stdint.h>\n");
        }
        if self.needs_stdbool {
            out.push_str("#include <stdbool.h>\n");
        }
        if self.needs_string {
            out.push_str("#include <string.h>\n");
        }
        if self.needs_limits {
            out.push_str("#include <limits.h>\n");
        }
        if self.needs_cmsis {
            out.push_str(&format!("#include \"{}\"\n", self.target.cmsis_header));
        }
        for include in &self.user_includes {
            out.push_str(include);
            out.push('\n');
        }
        if !out.is_empty() {
            out.push('\n');
        }

        if self.needs_isr {
            out.push_str("typedef void (*ISR)(void);\n\n");
        }

        let assert_kw = match self.mode {
            Mode::C => "_Static_assert",
            Mode::Cpp => "static_assert",
        };
        if self.needs_float_assert {
            out.push_str(&format!(
                "{}(sizeof(float) == 4, \"float bit access requires 32-bit float\");\n",
                assert_kw
            ));
        }
        if self.needs_double_assert {
            out.push_str(&format!(
                "{}(sizeof(double) == 8, \"double bit access requires 64-bit double\");\n",
                assert_kw
            ));
        }
        if self.needs_float_assert || self.needs_double_assert {
            out.push('\n');
        }

        for usage in &self.used_clamp_ops {
            if let Some((op, ty)) = usage.split_once('_') {
                out.push_str(&clamp_helper_definition(op, ty));
                out.push('\n');
            }
        }
        for usage in &self.used_safe_div_ops {
            if let Some((op, ty)) = usage.split_once('_') {
                out.push_str(&safe_div_helper_definition(op, ty));
                out.push('\n');
            }
        }
        out
    }
}

/// Saturating arithmetic helper for one `{op}_{type}` pair.
fn clamp_helper_definition(op: &str, ty: &str) -> String {
    let c_ty = c_primitive_name(ty).unwrap_or("uint32_t");
    let width = type_bit_width(ty).unwrap_or(32);
    let name = format!("cnx_clamp_{}_{}", op, ty);

    if !is_signed_type(ty) {
        let max = format!("UINT{}_MAX", width);
        let body = match op {
            "add" => format!(
                "    return (lhs > ({c_ty})({max} - rhs)) ? {max} : ({c_ty})(lhs + rhs);",
                c_ty = c_ty,
                max = max
            ),
            "sub" => format!(
                "    return (lhs < rhs) ? 0U : ({c_ty})(lhs - rhs);",
                c_ty = c_ty
            ),
            _ => format!(
                "    return (rhs != 0U && lhs > ({c_ty})({max} / rhs)) ? {max} : ({c_ty})(lhs * rhs);",
                c_ty = c_ty,
                max = max
            ),
        };
        return format!(
            "static inline {c_ty} {name}({c_ty} lhs, {c_ty} rhs) {{\n{body}\n}}\n",
            c_ty = c_ty,
            name = name,
            body = body
        );
    }

    let max = format!("INT{}_MAX", width);
    let min = format!("INT{}_MIN", width);
    if width < 64 {
        // Narrow signed types widen into int64_t and clamp the result
        let binary = match op {
            "add" => "+",
            "sub" => "-",
            _ => "*",
        };
        return format!(
            "static inline {c_ty} {name}({c_ty} lhs, {c_ty} rhs) {{\n\
             \x20   int64_t result = (int64_t)lhs {op} (int64_t)rhs;\n\
             \x20   if (result > {max}) {{ return {max}; }}\n\
             \x20   if (result < {min}) {{ return {min}; }}\n\
             \x20   return ({c_ty})result;\n\
             }}\n",
            c_ty = c_ty,
            name = name,
            op = binary,
            max = max,
            min = min
        );
    }

    // 64-bit signed: no wider type to lean on
    match op {
        "add" => format!(
            "static inline int64_t {name}(int64_t lhs, int64_t rhs) {{\n\
             \x20   if (rhs > 0 && lhs > {max} - rhs) {{ return {max}; }}\n\
             \x20   if (rhs < 0 && lhs < {min} - rhs) {{ return {min}; }}\n\
             \x20   return lhs + rhs;\n\
             }}\n",
            name = name,
            max = max,
            min = min
        ),
        "sub" => format!(
            "static inline int64_t {name}(int64_t lhs, int64_t rhs) {{\n\
             \x20   if (rhs < 0 && lhs > {max} + rhs) {{ return {max}; }}\n\
             \x20   if (rhs > 0 && lhs < {min} + rhs) {{ return {min}; }}\n\
             \x20   return lhs - rhs;\n\
             }}\n",
            name = name,
            max = max,
            min = min
        ),
        _ => format!(
            "static inline int64_t {name}(int64_t lhs, int64_t rhs) {{\n\
             \x20   if (lhs == 0 || rhs == 0) {{ return 0; }}\n\
             \x20   if (lhs > 0) {{\n\
             \x20       if (rhs > 0) {{\n\
             \x20           if (lhs > {max} / rhs) {{ return {max}; }}\n\
             \x20       }} else if (rhs < {min} / lhs) {{ return {min}; }}\n\
             \x20   }} else {{\n\
             \x20       if (rhs > 0) {{\n\
             \x20           if (lhs < {min} / rhs) {{ return {min}; }}\n\
             \x20       }} else if (lhs < {max} / rhs) {{ return {max}; }}\n\
             \x20   }}\n\
             \x20   return lhs * rhs;\n\
             }}\n",
            name = name,
            max = max,
            min = min
        ),
    }
}

/// Zero-divisor guard helper for one `{div|mod}_{type}` pair.
fn safe_div_helper_definition(op: &str, ty: &str) -> String {
    let c_ty = c_primitive_name(ty).unwrap_or("uint32_t");
    let width = type_bit_width(ty).unwrap_or(32);
    let name = format!("cnx_safe_{}_{}", op, ty);
    let operator = if op == "div" { "/" } else { "%" };

    if is_signed_type(ty) {
        // INTn_MIN / -1 overflows; divide saturates, modulo is zero
        let overflow_result = if op == "div" {
            format!("INT{}_MAX", width)
        } else {
            "0".to_string()
        };
        return format!(
            "static inline {c_ty} {name}({c_ty} num, {c_ty} den) {{\n\
             \x20   if (den == 0) {{ return 0; }}\n\
             \x20   if (num == INT{width}_MIN && den == -1) {{ return {overflow}; }}\n\
             \x20   return ({c_ty})(num {op} den);\n\
             }}\n",
            c_ty = c_ty,
            name = name,
            width = width,
            overflow = overflow_result,
            op = operator
        );
    }
    format!(
        "static inline {c_ty} {name}({c_ty} num, {c_ty} den) {{\n\
         \x20   return (den == 0U) ? 0U : ({c_ty})(num {op} den);\n\
         }}\n",
        c_ty = c_ty,
        name = name,
        op = operator
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetCapabilities;
    use crate::symbols::SymbolInfo;

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    #[test]
    fn test_no_flags_no_prelude() {
        // Property 1: no directive for an unused header
        let cg = state();
        assert_eq!(cg.emit_prelude(), "");
    }

    #[test]
    fn test_header_order_is_fixed() {
        let mut cg = state();
        cg.needs_stdint = true;
        cg.needs_stdbool = true;
        cg.needs_string = true;
        cg.needs_limits = true;
        cg.needs_cmsis = true;
        let out = cg.emit_prelude();
        let stdint = out.find("<stdint.h>").unwrap();
        let stdbool = out.find("<stdbool.h>").unwrap();
        let string = out.find("<string.h>").unwrap();
        let limits = out.find("<limits.h>").unwrap();
        let cmsis = out.find("cmsis_compiler.h").unwrap();
        assert!(stdint < stdbool && stdbool < string && string < limits && limits < cmsis);
    }

    #[test]
    fn test_isr_typedef_emitted_when_needed() {
        let mut cg = state();
        cg.needs_isr = true;
        assert!(cg.emit_prelude().contains("typedef void (*ISR)(void);"));
    }

    #[test]
    fn test_float_assert_follows_mode() {
        let mut cg = state();
        cg.needs_float_assert = true;
        assert!(cg
            .emit_prelude()
            .contains("_Static_assert(sizeof(float) == 4"));

        let mut cpp = CodegenState::new(
            SymbolInfo::new(),
            Mode::Cpp,
            TargetCapabilities::default(),
        );
        cpp.needs_float_assert = true;
        let out = cpp.emit_prelude();
        assert!(out.contains("static_assert(sizeof(float) == 4"));
        assert!(!out.contains("_Static_assert"));
    }

    #[test]
    fn test_clamp_helper_definitions() {
        // Scenario E: the prelude defines cnx_clamp_add_u8
        let mut cg = state();
        cg.used_clamp_ops.insert("add_u8".to_string());
        let out = cg.emit_prelude();
        assert!(out.contains("static inline uint8_t cnx_clamp_add_u8(uint8_t lhs, uint8_t rhs)"));
        assert!(out.contains("UINT8_MAX"));
    }

    #[test]
    fn test_signed_clamp_widens() {
        let def = clamp_helper_definition("add", "i16");
        assert!(def.contains("int64_t result"));
        assert!(def.contains("INT16_MAX"));
        assert!(def.contains("INT16_MIN"));
    }

    #[test]
    fn test_signed_64_clamp_has_no_widening() {
        let def = clamp_helper_definition("add", "i64");
        assert!(!def.contains("result"));
        assert!(def.contains("INT64_MAX - rhs"));
    }

    #[test]
    fn test_safe_div_definitions() {
        let unsigned = safe_div_helper_definition("div", "u16");
        assert!(unsigned.contains("cnx_safe_div_u16"));
        assert!(unsigned.contains("(den == 0U) ? 0U"));

        let signed = safe_div_helper_definition("div", "i32");
        assert!(signed.contains("INT32_MIN && den == -1"));
        assert!(signed.contains("INT32_MAX"));

        let modulo = safe_div_helper_definition("mod", "u8");
        assert!(modulo.contains("num % den"));
    }

    #[test]
    fn test_helper_emission_is_deterministic() {
        let mut cg = state();
        cg.used_clamp_ops.insert("sub_u8".to_string());
        cg.used_clamp_ops.insert("add_u8".to_string());
        let out = cg.emit_prelude();
        let add = out.find("cnx_clamp_add_u8").unwrap();
        let sub = out.find("cnx_clamp_sub_u8").unwrap();
        // BTreeSet ordering: add before sub
        assert!(add < sub);
    }
}
