use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Segment {
    Constant,
    Local,
    Static,
    Argument,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn name(&self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }

    /// Largest index the segment can address, if it is bounded.
    pub fn max_index(&self) -> Option<u16> {
        match self {
            Segment::Constant => Some(32767),
            Segment::Pointer => Some(1),
            Segment::Temp => Some(7),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    // Stack Basics
    Push(Segment, u16),
    Pop(Segment, u16),
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,

    // Control
    Label(String),
    Goto(String),
    IfGoto(String),

    // Functions
    Function(String, u16),
    Call(String, u16),
    Return,
}

#[cfg(test)]
impl Command {
    /// Net change in stack depth, for commands that have a fixed one.
    pub fn stack_delta(&self) -> Option<i32> {
        use Command::*;
        match self {
            Push(..) => Some(1),
            Pop(..) | Add | Sub | Eq | Gt | Lt | And | Or | IfGoto(_) => Some(-1),
            Neg | Not | Label(_) | Goto(_) => Some(0),
            Function(..) | Call(..) | Return => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Command::*;
        match self {
            Push(seg, arg) => write!(f, "push {} {}", seg, arg),
            Pop(seg, arg) => write!(f, "pop {} {}", seg, arg),
            Add => f.write_str("add"),
            Sub => f.write_str("sub"),
            Neg => f.write_str("neg"),
            Eq => f.write_str("eq"),
            Gt => f.write_str("gt"),
            Lt => f.write_str("lt"),
            And => f.write_str("and"),
            Or => f.write_str("or"),
            Not => f.write_str("not"),
            Label(sym) => write!(f, "label {}", sym),
            Goto(sym) => write!(f, "goto {}", sym),
            IfGoto(sym) => write!(f, "if-goto {}", sym),
            Function(name, locals) => write!(f, "function {} {}", name, locals),
            Call(name, args) => write!(f, "call {} {}", name, args),
            Return => f.write_str("return"),
        }
    }
}

#[test]
fn test_display_matches_vm_syntax() {
    assert_eq!(Command::Push(Segment::Argument, 2).to_string(), "push argument 2");
    assert_eq!(Command::IfGoto("LOOP".into()).to_string(), "if-goto LOOP");
    assert_eq!(Command::Call("Math.mul".into(), 2).to_string(), "call Math.mul 2");
    assert_eq!(Command::Return.to_string(), "return");
}
