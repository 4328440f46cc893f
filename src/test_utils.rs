//! Hack assembler and CPU emulator for exercising generated code in tests.

use std::collections::HashMap;

use crate::translator::{Translator, STACK_BASE};

const MAX_STEPS: usize = 2_000_000;
const RAM_SIZE: usize = 32768;

const COMPS: &[&str] = &[
    "0", "1", "-1", "D", "A", "M", "!D", "!A", "!M", "-D", "-A", "-M", "D+1", "A+1", "M+1",
    "D-1", "A-1", "M-1", "D+A", "D+M", "D-A", "D-M", "A-D", "M-D", "D&A", "D&M", "D|A", "D|M",
];

const JUMPS: &[&str] = &["", "JGT", "JEQ", "JGE", "JLT", "JNE", "JLE", "JMP"];

#[derive(Debug, Clone, Copy)]
struct Dest {
    a: bool,
    d: bool,
    m: bool,
}

#[derive(Debug, Clone, Copy)]
enum Instr {
    At(i16),
    C {
        dest: Dest,
        comp: &'static str,
        jump: &'static str,
    },
}

pub struct Cpu {
    pub ram: Vec<i16>,
    rom: Vec<Instr>,
    pc: usize,
    a: i16,
    d: i16,
    labels: HashMap<String, usize>,
    variables: HashMap<String, u16>,
}

fn predefined(sym: &str) -> Option<u16> {
    match sym {
        "SP" => Some(0),
        "LCL" => Some(1),
        "ARG" => Some(2),
        "THIS" => Some(3),
        "THAT" => Some(4),
        "SCREEN" => Some(16384),
        "KBD" => Some(24576),
        _ => sym
            .strip_prefix('R')
            .and_then(|n| n.parse::<u16>().ok())
            .filter(|n| *n < 16),
    }
}

impl Cpu {
    /// Assemble Hack source. Panics on anything a real assembler would reject.
    pub fn assemble(asm: &str) -> Cpu {
        let lines: Vec<&str> = asm
            .lines()
            .map(|l| l.split_once("//").map(|(s, _)| s).unwrap_or(l).trim())
            .filter(|l| !l.is_empty())
            .collect();

        let mut labels = HashMap::new();
        let mut count = 0;
        for line in &lines {
            if let Some(label) = line.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
                assert!(
                    labels.insert(label.to_string(), count).is_none(),
                    "duplicate label {}",
                    label
                );
            } else {
                count += 1;
            }
        }

        let mut variables: HashMap<String, u16> = HashMap::new();
        let mut rom = Vec::new();
        for line in lines.iter().copied().filter(|l| !l.starts_with('(')) {
            if let Some(sym) = line.strip_prefix('@') {
                let value = if let Ok(n) = sym.parse::<u16>() {
                    assert!(n <= 32767, "immediate out of range: {}", line);
                    n
                } else if let Some(n) = predefined(sym) {
                    n
                } else if let Some(&n) = labels.get(sym) {
                    n as u16
                } else {
                    let next = 16 + variables.len() as u16;
                    *variables.entry(sym.to_string()).or_insert(next)
                };
                rom.push(Instr::At(value as i16));
            } else {
                let (dest, rest) = line.split_once('=').unwrap_or(("", line));
                let (comp, jump) = rest.split_once(';').unwrap_or((rest, ""));
                let comp = COMPS
                    .iter()
                    .copied()
                    .find(|c| *c == comp)
                    .unwrap_or_else(|| panic!("non-canonical comp in `{}`", line));
                let jump = JUMPS
                    .iter()
                    .copied()
                    .find(|j| *j == jump)
                    .unwrap_or_else(|| panic!("bad jump in `{}`", line));
                assert!(dest.chars().all(|c| "ADM".contains(c)), "bad dest in `{}`", line);
                let dest = Dest {
                    a: dest.contains('A'),
                    d: dest.contains('D'),
                    m: dest.contains('M'),
                };
                rom.push(Instr::C { dest, comp, jump });
            }
        }

        Cpu {
            ram: vec![0; RAM_SIZE],
            rom,
            pc: 0,
            a: 0,
            d: 0,
            labels,
            variables,
        }
    }

    /// Segment bases for running code without a bootstrap.
    pub fn init_segments(&mut self) {
        self.ram[0] = STACK_BASE as i16;
        self.ram[1] = 300;
        self.ram[2] = 400;
        self.ram[3] = 3000;
        self.ram[4] = 3010;
    }

    pub fn symbol(&self, name: &str) -> Option<u16> {
        self.variables.get(name).copied()
    }

    pub fn sp(&self) -> i16 {
        self.ram[0]
    }

    pub fn stack(&self) -> &[i16] {
        &self.ram[STACK_BASE as usize..self.sp() as usize]
    }

    fn m(&self) -> i16 {
        self.ram[(self.a as u16 as usize) % RAM_SIZE]
    }

    fn step(&mut self) {
        match self.rom[self.pc] {
            Instr::At(n) => {
                self.a = n;
                self.pc += 1;
            }
            Instr::C { dest, comp, jump } => {
                let (a, d) = (self.a, self.d);
                let value = match comp {
                    "0" => 0,
                    "1" => 1,
                    "-1" => -1,
                    "D" => d,
                    "A" => a,
                    "M" => self.m(),
                    "!D" => !d,
                    "!A" => !a,
                    "!M" => !self.m(),
                    "-D" => d.wrapping_neg(),
                    "-A" => a.wrapping_neg(),
                    "-M" => self.m().wrapping_neg(),
                    "D+1" => d.wrapping_add(1),
                    "A+1" => a.wrapping_add(1),
                    "M+1" => self.m().wrapping_add(1),
                    "D-1" => d.wrapping_sub(1),
                    "A-1" => a.wrapping_sub(1),
                    "M-1" => self.m().wrapping_sub(1),
                    "D+A" => d.wrapping_add(a),
                    "D+M" => d.wrapping_add(self.m()),
                    "D-A" => d.wrapping_sub(a),
                    "D-M" => d.wrapping_sub(self.m()),
                    "A-D" => a.wrapping_sub(d),
                    "M-D" => self.m().wrapping_sub(d),
                    "D&A" => d & a,
                    "D&M" => d & self.m(),
                    "D|A" => d | a,
                    "D|M" => d | self.m(),
                    other => unreachable!("{}", other),
                };
                let taken = match jump {
                    "" => false,
                    "JGT" => value > 0,
                    "JEQ" => value == 0,
                    "JGE" => value >= 0,
                    "JLT" => value < 0,
                    "JNE" => value != 0,
                    "JLE" => value <= 0,
                    "JMP" => true,
                    other => unreachable!("{}", other),
                };
                if dest.m {
                    self.ram[(a as u16 as usize) % RAM_SIZE] = value;
                }
                if dest.a {
                    self.a = value;
                }
                if dest.d {
                    self.d = value;
                }
                self.pc = if taken { a as u16 as usize } else { self.pc + 1 };
            }
        }
    }

    /// Run until the program counter falls off the end of the program.
    pub fn run(&mut self) {
        let mut steps = 0;
        while self.pc < self.rom.len() {
            self.step();
            steps += 1;
            assert!(steps < MAX_STEPS, "program did not halt");
        }
    }

    /// Run until execution reaches `label`.
    pub fn run_until(&mut self, label: &str) {
        let target = *self.labels.get(label).expect("unknown label");
        let mut steps = 0;
        while self.pc != target {
            assert!(self.pc < self.rom.len(), "ran off the end before {}", label);
            self.step();
            steps += 1;
            assert!(steps < MAX_STEPS, "never reached {}", label);
        }
    }
}

/// Translate `(unit name, source)` pairs into one assembly listing.
pub fn translate_units(units: &[(&str, &str)], bootstrap: Option<&str>) -> String {
    let mut translator = Translator::new(Vec::new());
    if let Some(entry) = bootstrap {
        translator.bootstrap(entry).unwrap();
    }
    for (name, source) in units {
        translator.begin_unit(name);
        for command in crate::parser::parse(source) {
            translator.translate(&command.unwrap()).unwrap();
        }
    }
    String::from_utf8(translator.into_inner().unwrap()).unwrap()
}

/// Translate a single unit without bootstrap and run it to completion.
pub fn run_vm(source: &str) -> Cpu {
    let mut cpu = Cpu::assemble(&translate_units(&[("Test", source)], None));
    cpu.init_segments();
    cpu.run();
    cpu
}
