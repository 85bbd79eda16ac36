//! VM command to Hack assembly lowering
//!
//! One `CodeWriter` translates one `.vm` file. It owns the per-file state:
//! the unique identifier (uppercased file stem) baked into generated labels
//! and static symbols, the comparison/call counters, and the name of the
//! function currently being translated. Nothing else carries over between
//! commands.

use crate::parser::{ArithmeticOp, Segment, VmCommand};

// Appends each argument as one assembly line.
macro_rules! emit {
    ($self:expr, $($line:expr),+ $(,)?) => {{
        $( $self.push_line(&$line); )+
    }};
}

pub struct CodeWriter {
    output: String,
    uid: String,
    eq_count: usize,
    lt_count: usize,
    gt_count: usize,
    call_count: usize,
    current_function: String,
}

impl CodeWriter {
    /// Creates a writer for one translation unit. `stem` is the source
    /// filename without directory or extension.
    #[must_use]
    pub fn new(stem: &str) -> Self {
        Self {
            output: String::with_capacity(8192),
            uid: stem.to_uppercase(),
            eq_count: 1,
            lt_count: 1,
            gt_count: 1,
            call_count: 1,
            current_function: String::new(),
        }
    }

    /// Consumes the writer, returning the accumulated assembly text.
    #[must_use]
    pub fn finish(self) -> String {
        self.output
    }

    /// Emits the run-once preamble: SP at 256, then `call Sys.init 0`.
    pub fn write_bootstrap(&mut self) {
        emit!(self, "// bootstrap", "@256", "D=A", "@SP", "M=D");
        self.write_call("Sys.init", 0);
    }

    /// Translates one command, prefixed by a comment naming it.
    pub fn write_command(&mut self, command: &VmCommand) {
        emit!(self, format!("// {command}"));
        match command {
            VmCommand::Arithmetic(op) => self.write_arithmetic(*op),
            VmCommand::Push(segment, index) => self.write_push(*segment, *index),
            VmCommand::Pop(segment, index) => self.write_pop(*segment, *index),
            VmCommand::Label(name) => {
                let label = self.flow_label(name);
                emit!(self, format!("({label})"));
            }
            VmCommand::Goto(name) => {
                let label = self.flow_label(name);
                emit!(self, format!("@{label}"), "0;JMP");
            }
            VmCommand::IfGoto(name) => {
                let label = self.flow_label(name);
                emit!(self, "@SP", "AM=M-1", "D=M", format!("@{label}"), "D;JNE");
            }
            VmCommand::Function(name, n_locals) => self.write_function(name, *n_locals),
            VmCommand::Call(name, n_args) => self.write_call(name, *n_args),
            VmCommand::Return => self.write_return(),
        }
    }

    fn write_arithmetic(&mut self, op: ArithmeticOp) {
        match op {
            ArithmeticOp::Add => self.write_binary("M=D+M"),
            ArithmeticOp::Sub => self.write_binary("M=M-D"),
            ArithmeticOp::And => self.write_binary("M=D&M"),
            ArithmeticOp::Or => self.write_binary("M=D|M"),
            ArithmeticOp::Neg => self.write_unary("M=-M"),
            ArithmeticOp::Not => self.write_unary("M=!M"),
            ArithmeticOp::ShiftLeft => self.write_unary("M=M<<"),
            ArithmeticOp::ShiftRight => self.write_unary("M=M>>"),
            ArithmeticOp::Eq => self.write_eq(),
            ArithmeticOp::Lt => {
                let count = self.lt_count;
                self.lt_count += 1;
                self.write_ordered_comparison("LT", count, "D;JLT", "D;JLT");
            }
            ArithmeticOp::Gt => {
                let count = self.gt_count;
                self.gt_count += 1;
                self.write_ordered_comparison("GT", count, "D;JGE", "D;JGT");
            }
        }
    }

    /// Pops the top into D, then combines it into the new top in place.
    fn write_binary(&mut self, combine: &str) {
        emit!(self, "@SP", "AM=M-1", "D=M", "A=A-1", combine);
    }

    /// Rewrites the stack top in place.
    fn write_unary(&mut self, apply: &str) {
        emit!(self, "@SP", "A=M-1", apply);
    }

    /// Equality via subtraction: the 16-bit wrap of x-y is zero iff x = y,
    /// so no sign handling is needed.
    fn write_eq(&mut self) {
        let count = self.eq_count;
        self.eq_count += 1;
        let true_label = format!("EQ_TRUE_{}_{}", count, self.uid);
        let end_label = format!("EQ_END_{}_{}", count, self.uid);

        emit!(
            self,
            "@SP",
            "AM=M-1",
            "D=M",
            "A=A-1",
            "D=M-D",
            format!("@{true_label}"),
            "D;JEQ",
            "D=0",
            format!("@{end_label}"),
            "0;JMP",
            format!("({true_label})"),
            "D=-1",
            format!("({end_label})"),
            "@SP",
            "A=M-1",
            "M=D"
        );
    }

    /// Overflow-safe ordered comparison of x (below) against y (top).
    ///
    /// Subtracting operands of opposite sign can wrap, so the signs are
    /// split first. When they differ, the sign of x alone decides the
    /// answer (`mixed_jump` sends x's sign to TRUE); only operands of
    /// equal sign are subtracted and `same_sign_jump` tests x - y
    /// against zero.
    fn write_ordered_comparison(
        &mut self,
        prefix: &str,
        count: usize,
        mixed_jump: &str,
        same_sign_jump: &str,
    ) {
        let label = |tag: &str| format!("{}_{}_{}_{}", prefix, tag, count, self.uid);
        let y_neg = label("YNEG");
        let mixed = label("MIXED");
        let same = label("SAME");
        let truthy = label("TRUE");
        let falsy = label("FALSE");
        let end = label("END");

        emit!(
            self,
            // R14 = y (popped), R13 = x (left on the stack top)
            "@SP",
            "AM=M-1",
            "D=M",
            "@R14",
            "M=D",
            "@SP",
            "A=M-1",
            "D=M",
            "@R13",
            "M=D",
            // split on the sign of y
            "@R14",
            "D=M",
            format!("@{y_neg}"),
            "D;JLT",
            // y >= 0: same sign iff x >= 0
            "@R13",
            "D=M",
            format!("@{same}"),
            "D;JGE",
            format!("@{mixed}"),
            "0;JMP",
            format!("({y_neg})"),
            // y < 0: same sign iff x < 0
            "@R13",
            "D=M",
            format!("@{same}"),
            "D;JLT",
            format!("({mixed})"),
            // signs differ: x's sign is the answer
            "@R13",
            "D=M",
            format!("@{truthy}"),
            mixed_jump,
            format!("@{falsy}"),
            "0;JMP",
            format!("({same})"),
            // equal signs: x - y cannot overflow
            "@R14",
            "D=M",
            "@R13",
            "D=M-D",
            format!("@{truthy}"),
            same_sign_jump,
            format!("({falsy})"),
            "D=0",
            format!("@{end}"),
            "0;JMP",
            format!("({truthy})"),
            "D=-1",
            format!("({end})"),
            "@SP",
            "A=M-1",
            "M=D"
        );
    }

    fn write_push(&mut self, segment: Segment, index: u16) {
        match segment {
            Segment::Constant => emit!(self, format!("@{index}"), "D=A"),
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                let base = Self::segment_base(segment);
                emit!(
                    self,
                    format!("@{index}"),
                    "D=A",
                    format!("@{base}"),
                    "A=D+M",
                    "D=M"
                );
            }
            Segment::Temp => emit!(self, format!("@{}", 5 + index), "D=M"),
            Segment::Pointer => emit!(self, format!("@{}", 3 + index), "D=M"),
            Segment::Static => {
                let symbol = self.static_symbol(index);
                emit!(self, format!("@{symbol}"), "D=M");
            }
        }
        self.write_push_d();
    }

    fn write_pop(&mut self, segment: Segment, index: u16) {
        // Leave the target address in D, park it in R15, then store the
        // popped value through it.
        match segment {
            Segment::Constant => unreachable!("pop constant is rejected at parse time"),
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                let base = Self::segment_base(segment);
                emit!(self, format!("@{index}"), "D=A", format!("@{base}"), "D=D+M");
            }
            Segment::Temp => emit!(self, format!("@{}", 5 + index), "D=A"),
            Segment::Pointer => emit!(self, format!("@{}", 3 + index), "D=A"),
            Segment::Static => {
                let symbol = self.static_symbol(index);
                emit!(self, format!("@{symbol}"), "D=A");
            }
        }
        emit!(self, "@R15", "M=D", "@SP", "AM=M-1", "D=M", "@R15", "A=M", "M=D");
    }

    fn write_function(&mut self, name: &str, n_locals: u16) {
        self.current_function = name.to_string();
        emit!(self, format!("({name})"));

        // Materialize the local slots as zeros with a counted loop.
        if n_locals > 0 {
            let init = format!("{}$INIT.{}", name, self.uid);
            emit!(
                self,
                format!("@{n_locals}"),
                "D=A",
                format!("({init})"),
                "@SP",
                "A=M",
                "M=0",
                "@SP",
                "M=M+1",
                "D=D-1",
                format!("@{init}"),
                "D;JNE"
            );
        }
    }

    fn write_call(&mut self, name: &str, n_args: u16) {
        let return_label = format!("RET_{}_{}_{}", name, self.call_count, self.uid);
        self.call_count += 1;

        // Push the return address, then the caller's frame pointers.
        emit!(self, format!("@{return_label}"), "D=A");
        self.write_push_d();
        for pointer in ["LCL", "ARG", "THIS", "THAT"] {
            emit!(self, format!("@{pointer}"), "D=M");
            self.write_push_d();
        }

        emit!(
            self,
            // ARG = SP - 5 - n_args
            "@SP",
            "D=M",
            format!("@{}", u32::from(n_args) + 5),
            "D=D-A",
            "@ARG",
            "M=D",
            // LCL = SP
            "@SP",
            "D=M",
            "@LCL",
            "M=D",
            format!("@{name}"),
            "0;JMP",
            format!("({return_label})")
        );
    }

    fn write_return(&mut self) {
        emit!(
            self,
            // R15 = frame end (LCL)
            "@LCL",
            "D=M",
            "@R15",
            "M=D",
            // R14 = return address, fetched before the return value can
            // overwrite the slot (they coincide when n_args = 0)
            "@5",
            "A=D-A",
            "D=M",
            "@R14",
            "M=D",
            // *ARG = return value
            "@SP",
            "AM=M-1",
            "D=M",
            "@ARG",
            "A=M",
            "M=D",
            // SP = ARG + 1
            "@ARG",
            "D=M+1",
            "@SP",
            "M=D",
            // Restore THAT, THIS, ARG, LCL by walking the frame down
            "@R15",
            "AM=M-1",
            "D=M",
            "@THAT",
            "M=D",
            "@R15",
            "AM=M-1",
            "D=M",
            "@THIS",
            "M=D",
            "@R15",
            "AM=M-1",
            "D=M",
            "@ARG",
            "M=D",
            "@R15",
            "AM=M-1",
            "D=M",
            "@LCL",
            "M=D",
            "@R14",
            "A=M",
            "0;JMP"
        );
    }

    /// Push the D register onto the stack.
    fn write_push_d(&mut self) {
        emit!(self, "@SP", "A=M", "M=D", "@SP", "M=M+1");
    }

    /// Flow labels are scoped by both the enclosing function and the file
    /// uid, so nested translation units can never collide.
    fn flow_label(&self, name: &str) -> String {
        format!("{}${}.{}", self.current_function, name, self.uid)
    }

    /// Assembly variable backing `static` slot `index` of this file.
    fn static_symbol(&self, index: u16) -> String {
        format!("{}.STATIC_VAR.{}", self.uid, index)
    }

    fn segment_base(segment: Segment) -> &'static str {
        match segment {
            Segment::Local => "LCL",
            Segment::Argument => "ARG",
            Segment::This => "THIS",
            Segment::That => "THAT",
            _ => unreachable!("segment {segment:?} has no base pointer"),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn translate_all(stem: &str, source: &str) -> String {
        let mut writer = CodeWriter::new(stem);
        for (i, line) in source.lines().enumerate() {
            if let Some(cmd) = parse_line(line, i + 1).unwrap() {
                writer.write_command(&cmd);
            }
        }
        writer.finish()
    }

    #[test]
    fn push_constant_loads_immediate() {
        let asm = translate_all("Test", "push constant 7");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(
            lines,
            vec![
                "// push constant 7",
                "@7",
                "D=A",
                "@SP",
                "A=M",
                "M=D",
                "@SP",
                "M=M+1",
            ]
        );
    }

    #[test]
    fn pop_routes_address_through_r15() {
        let asm = translate_all("Test", "pop local 2");
        assert!(asm.contains("@2\nD=A\n@LCL\nD=D+M\n@R15\nM=D\n"));
        assert!(asm.contains("@SP\nAM=M-1\nD=M\n@R15\nA=M\nM=D\n"));
    }

    #[test]
    fn static_symbols_carry_the_file_uid() {
        let asm = translate_all("Square", "push static 3\npop static 3");
        assert!(asm.contains("@SQUARE.STATIC_VAR.3"));
    }

    #[test]
    fn temp_and_pointer_map_to_fixed_slots() {
        let asm = translate_all("Test", "push temp 7\npush pointer 1");
        assert!(asm.contains("@12\nD=M"));
        assert!(asm.contains("@4\nD=M"));
    }

    #[test]
    fn comparison_labels_count_up_per_op() {
        let asm = translate_all("Test", "eq\neq\nlt");
        assert!(asm.contains("(EQ_TRUE_1_TEST)"));
        assert!(asm.contains("(EQ_TRUE_2_TEST)"));
        assert!(asm.contains("(LT_TRUE_1_TEST)"));
    }

    #[test]
    fn flow_labels_use_function_and_uid() {
        let asm = translate_all(
            "Test",
            "function Main.main 0\nlabel LOOP\ngoto LOOP\nif-goto LOOP",
        );
        assert!(asm.contains("(Main.main$LOOP.TEST)"));
        assert!(asm.contains("@Main.main$LOOP.TEST\n0;JMP"));
        assert!(asm.contains("D;JNE"));
    }

    #[test]
    fn function_with_no_locals_skips_init_loop() {
        let asm = translate_all("Test", "function F.g 0");
        assert!(asm.contains("(F.g)"));
        assert!(!asm.contains("INIT"));
    }

    #[test]
    fn function_locals_init_with_counted_loop() {
        let asm = translate_all("Test", "function F.g 3");
        assert!(asm.contains("(F.g)"));
        assert!(asm.contains("@3\nD=A\n(F.g$INIT.TEST)"));
        assert!(asm.contains("D;JNE"));
    }

    #[test]
    fn call_pushes_frame_and_places_return_label() {
        let asm = translate_all("Test", "call F.g 2");
        assert!(asm.contains("@RET_F.g_1_TEST\nD=A"));
        for pointer in ["@LCL", "@ARG", "@THIS", "@THAT"] {
            assert!(asm.contains(&format!("{pointer}\nD=M")));
        }
        // ARG = SP - 5 - 2
        assert!(asm.contains("@7\nD=D-A\n@ARG\nM=D"));
        assert!(asm.contains("@F.g\n0;JMP\n(RET_F.g_1_TEST)"));
    }

    #[test]
    fn call_counter_keeps_return_labels_unique() {
        let asm = translate_all("Test", "call F.g 0\ncall F.g 0");
        assert!(asm.contains("(RET_F.g_1_TEST)"));
        assert!(asm.contains("(RET_F.g_2_TEST)"));
    }

    #[test]
    fn return_fetches_return_address_before_result() {
        let asm = translate_all("Test", "return");
        let ret_addr = asm.find("@R14\nM=D").unwrap();
        let result_copy = asm.find("@ARG\nA=M\nM=D").unwrap();
        assert!(ret_addr < result_copy);
    }

    #[test]
    fn bootstrap_sets_sp_then_calls_sys_init() {
        let mut writer = CodeWriter::new("Sys");
        writer.write_bootstrap();
        let asm = writer.finish();
        assert!(asm.starts_with("// bootstrap\n@256\nD=A\n@SP\nM=D\n"));
        assert!(asm.contains("@Sys.init\n0;JMP"));
    }

    #[test]
    fn shift_ops_rewrite_top_in_place() {
        let asm = translate_all("Test", "shiftleft\nshiftright");
        assert!(asm.contains("@SP\nA=M-1\nM=M<<"));
        assert!(asm.contains("@SP\nA=M-1\nM=M>>"));
    }
}
