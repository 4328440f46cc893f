use std::collections::BTreeSet;
use std::io::{self, Write};

use crate::ast::{Command::*, Segment::*, *};

macro_rules! svec {
    ($($x:expr),* $(,)?) => (vec![$($x.to_string()),*]);
}

/// Initial stack pointer; everything below is reserved.
pub const STACK_BASE: u16 = 256;

const TEMP_BASE: u16 = 5;
const POINTER_BASE: u16 = 3;

// Scratch cells
const POP_ADDR: &str = "R13";
const FRAME: &str = "R14";
const RET_ADDR: &str = "R15";

fn at_c(arg: impl std::fmt::Display) -> String {
    format!("@{}", arg)
}

fn at_s(arg: &str) -> String {
    format!("@{}", arg)
}

fn label_decl(sym: &str) -> String {
    format!("({})", sym)
}

/// Indices are range-checked by the parser; anything past THAT is addressed raw.
fn pointer_arg(arg: u16) -> String {
    match arg {
        0 => "THIS".to_string(),
        1 => "THAT".to_string(),
        _ => format!("R{}", POINTER_BASE + arg),
    }
}

/// Push D onto the stack.
fn push_d() -> Vec<String> {
    svec![
        "@SP",
        "M=M+1",
        "A=M-1", // Don't need to refetch SP; this is safe
        "M=D"
    ]
}

/// Pop the stack top into D, leaving A at the vacated cell.
fn pop_d() -> Vec<String> {
    svec!["@SP", "AM=M-1", "D=M"]
}

fn push_constant(arg: u16) -> Vec<String> {
    let mut code = svec![at_c(arg), "D=A"];
    code.extend(push_d());
    code
}

/// Push microcode for the four base-register segments
fn seg_push(seg: &str, arg: u16) -> Vec<String> {
    let mut code = svec![
        at_s(seg),
        "D=M",
        at_c(arg),
        "A=D+A", // A = SEG+arg
        "D=M"    // D = value to push
    ];
    code.extend(push_d());
    code
}

fn seg_push_direct(label: &str) -> Vec<String> {
    let mut code = svec![at_s(label), "D=M"];
    code.extend(push_d());
    code
}

fn seg_pop(seg: &str, arg: u16) -> Vec<String> {
    let mut code = svec![
        at_s(seg),
        "D=M",
        at_c(arg),
        "D=D+A", // D = SEG+arg
        at_s(POP_ADDR),
        "M=D" // Stash the destination before SP moves
    ];
    code.extend(pop_d());
    code.extend(svec![
        at_s(POP_ADDR),
        "A=M", // At the destination address...
        "M=D"  // ... store the popped val
    ]);
    code
}

fn seg_pop_direct(label: &str) -> Vec<String> {
    let mut code = pop_d();
    code.extend(svec![at_s(label), "M=D"]);
    code
}

fn simple_un_op(comp: &str) -> Vec<String> {
    svec!["@SP", "A=M-1", format!("M={}", comp)]
}

// i.e. no conditions or jumps, just pop and run
fn simple_bin_op(comp: &str) -> Vec<String> {
    let mut code = pop_d(); // Right arg in D
    code.extend(svec![
        "A=A-1",               // Looking at second arg of stack, will overwrite
        format!("M={}", comp)  // Op and overwrite second element
    ]);
    code
}

/// Emits Hack assembly for a stream of VM commands.
///
/// One translator serves a whole run: the synthetic label counter is shared
/// by every unit so generated labels stay unique in the combined output.
pub struct Translator<W: Write> {
    out: W,
    unit: String,
    gen_sym: usize,
    statics: BTreeSet<u16>,
    annotate: bool,
}

impl<W: Write> Translator<W> {
    pub fn new(out: W) -> Self {
        Translator {
            out,
            unit: String::new(),
            gen_sym: 0,
            statics: BTreeSet::new(),
            annotate: true,
        }
    }

    /// Whether each command is preceded by a `// <command>` comment.
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Switch to a new source unit; statics are namespaced by `name`.
    pub fn begin_unit(&mut self, name: &str) {
        self.unit = name.to_string();
        self.statics.clear();
    }

    /// Static indices referenced so far by the current unit.
    pub fn statics(&self) -> &BTreeSet<u16> {
        &self.statics
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn next_gen_sym(&mut self) -> usize {
        let tmp = self.gen_sym;
        self.gen_sym += 1;
        tmp
    }

    fn emit(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn static_sym(&mut self, arg: u16) -> String {
        self.statics.insert(arg);
        format!("{}.static.{}", self.unit, arg)
    }

    fn push(&mut self, segment: Segment, arg: u16) -> Vec<String> {
        match segment {
            Constant => push_constant(arg),
            Static => {
                let sym = self.static_sym(arg);
                seg_push_direct(&sym)
            }
            Temp => seg_push_direct(&format!("R{}", TEMP_BASE + arg)),
            Pointer => seg_push_direct(&pointer_arg(arg)),
            Local => seg_push("LCL", arg),
            Argument => seg_push("ARG", arg),
            This => seg_push("THIS", arg),
            That => seg_push("THAT", arg),
        }
    }

    fn pop(&mut self, segment: Segment, arg: u16) -> Vec<String> {
        match segment {
            // Rejected by the parser; discard the value so the stack stays balanced.
            Constant => svec!["@SP", "M=M-1"],
            Static => {
                let sym = self.static_sym(arg);
                seg_pop_direct(&sym)
            }
            Temp => seg_pop_direct(&format!("R{}", TEMP_BASE + arg)),
            Pointer => seg_pop_direct(&pointer_arg(arg)),
            Local => seg_pop("LCL", arg),
            Argument => seg_pop("ARG", arg),
            This => seg_pop("THIS", arg),
            That => seg_pop("THAT", arg),
        }
    }

    fn cmp_sym(&self, kind: &str, sym: usize) -> String {
        format!("{}$CMP_{}.{}", self.unit, kind, sym)
    }

    /// Leaves `x - y` in D, or a value of the same sign when the subtraction
    /// would overflow (operands of opposite sign).
    fn ordered_difference(&self, sym: usize) -> Vec<String> {
        let x_neg = self.cmp_sym("XNEG", sym);
        let same = self.cmp_sym("SAME", sym);
        let test = self.cmp_sym("TEST", sym);
        let mut code = pop_d();
        code.extend(svec![
            at_s(POP_ADDR),
            "M=D", // y
            "@SP",
            "A=M-1",
            "D=M", // x
            at_s(&x_neg),
            "D;JLT",
            at_s(POP_ADDR),
            "D=M",
            at_s(&same),
            "D;JGE",
            "D=1", // x >= 0 > y
            at_s(&test),
            "0;JMP",
            label_decl(&x_neg),
            at_s(POP_ADDR),
            "D=M",
            at_s(&same),
            "D;JLT",
            "D=-1", // x < 0 <= y
            at_s(&test),
            "0;JMP",
            label_decl(&same),
            at_s(POP_ADDR),
            "D=M",
            "@SP",
            "A=M-1",
            "D=M-D",
            label_decl(&test),
        ]);
        code
    }

    fn compare(&mut self, jump: &str) -> Vec<String> {
        let sym = self.next_gen_sym();
        let true_sym = self.cmp_sym("TRUE", sym);
        let end_sym = self.cmp_sym("END", sym);
        let mut code = if jump == "JEQ" {
            // Wrapping subtraction is zero exactly when x == y
            let mut code = pop_d();
            code.extend(svec!["A=A-1", "D=M-D"]);
            code
        } else {
            self.ordered_difference(sym)
        };
        code.extend(svec![
            at_s(&true_sym),
            format!("D;{}", jump),
            "D=0",
            at_s(&end_sym),
            "0;JMP",
            label_decl(&true_sym),
            "D=-1",
            label_decl(&end_sym),
            "@SP",
            "A=M-1",
            "M=D"
        ]);
        code
    }

    fn label(&self, label: &str) -> Vec<String> {
        svec![label_decl(label)]
    }

    fn goto(&self, label: &str) -> Vec<String> {
        svec![
            at_s(label),
            "0;JMP" // Unconditional jump
        ]
    }

    fn if_goto(&self, label: &str) -> Vec<String> {
        let mut code = pop_d(); // Stack popped into D
        code.extend(svec![
            at_s(label),
            "D;JNE" // False is 0
        ]);
        code
    }

    fn function(&self, name: &str, locals: u16) -> Vec<String> {
        let mut code = svec![label_decl(name)];
        for _ in 0..locals {
            code.extend(push_constant(0));
        }
        code
    }

    fn call(&mut self, name: &str, args: u16) -> Vec<String> {
        let ret = format!("{}$ret.{}", name, self.next_gen_sym());

        // Return address, then the caller's frame
        let mut code = svec![at_s(&ret), "D=A"];
        code.extend(push_d());
        for reg in ["LCL", "ARG", "THIS", "THAT"] {
            code.extend(svec![at_s(reg), "D=M"]);
            code.extend(push_d());
        }

        code.extend(svec![
            // ARG = SP - 5 - args
            "@SP",
            "D=M",
            at_c(5 + u32::from(args)),
            "D=D-A",
            "@ARG",
            "M=D",
            // LCL = SP
            "@SP",
            "D=M",
            "@LCL",
            "M=D",
            at_s(name),
            "0;JMP",
            label_decl(&ret)
        ]);
        code
    }

    fn return_(&self) -> Vec<String> {
        let mut code = svec![
            // frame = LCL
            "@LCL",
            "D=M",
            at_s(FRAME),
            "M=D",
            // ret = *(frame - 5), saved before the return value can overwrite it
            at_c(5),
            "A=D-A",
            "D=M",
            at_s(RET_ADDR),
            "M=D"
        ];

        // *ARG = pop(); SP = ARG + 1
        code.extend(pop_d());
        code.extend(svec!["@ARG", "A=M", "M=D", "@ARG", "D=M+1", "@SP", "M=D"]);

        // Restore the caller's frame from below the frame base
        for (offset, reg) in [(1, "THAT"), (2, "THIS"), (3, "ARG"), (4, "LCL")] {
            code.extend(svec![
                at_s(FRAME),
                "D=M",
                at_c(offset),
                "A=D-A",
                "D=M",
                at_s(reg),
                "M=D"
            ]);
        }

        code.extend(svec![at_s(RET_ADDR), "A=M", "0;JMP"]);
        code
    }

    /// Initialise SP and call `entry` with no arguments.
    pub fn bootstrap(&mut self, entry: &str) -> io::Result<()> {
        let mut code = Vec::new();
        if self.annotate {
            code.push("// bootstrap".to_string());
        }
        code.extend(svec![at_c(STACK_BASE), "D=A", "@SP", "M=D"]);
        code.extend(self.call(entry, 0));
        self.emit(&code)
    }

    pub fn translate(&mut self, command: &Command) -> io::Result<()> {
        let translated = match command {
            Push(seg, arg) => self.push(*seg, *arg),
            Pop(seg, arg) => self.pop(*seg, *arg),
            Not => simple_un_op("!M"),
            Neg => simple_un_op("-M"),
            Add => simple_bin_op("D+M"),
            Sub => simple_bin_op("M-D"),
            And => simple_bin_op("D&M"),
            Or => simple_bin_op("D|M"),
            Eq => self.compare("JEQ"),
            Gt => self.compare("JGT"),
            Lt => self.compare("JLT"),
            Label(sym) => self.label(sym),
            Goto(sym) => self.goto(sym),
            IfGoto(sym) => self.if_goto(sym),
            Function(name, locals) => self.function(name, *locals),
            Call(name, args) => self.call(name, *args),
            Return => self.return_(),
        };

        if self.annotate {
            writeln!(self.out, "// {}", command)?;
        }
        self.emit(&translated)
    }
}
