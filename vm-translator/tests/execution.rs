//! Executes translated programs on a minimal Hack machine interpreter and
//! asserts the resulting stack state.
//!
//! The interpreter runs the symbolic assembly directly: labels resolve to
//! instruction indices, other symbols to RAM addresses, and C-instructions
//! are evaluated over A, D and RAM with 16-bit wrapping arithmetic.

use std::collections::HashMap;

use vm_translator::translate;

const RAM_SIZE: usize = 32768;
const STEP_LIMIT: usize = 100_000;

struct Machine {
    ram: Vec<i16>,
    a: i16,
    d: i16,
}

impl Machine {
    fn new() -> Self {
        let mut ram = vec![0i16; RAM_SIZE];
        ram[0] = 256; // SP at program entry
        Self { ram, a: 0, d: 0 }
    }

    fn sp(&self) -> i16 {
        self.ram[0]
    }

    fn stack_top(&self) -> i16 {
        self.ram[(self.sp() as usize) - 1]
    }

    /// Runs the program until the PC falls off the end or the step limit
    /// is hit (halt loops spin in place without changing state).
    fn run(&mut self, asm: &str) {
        let (instructions, labels) = load(asm);
        let mut variables: HashMap<String, i16> = HashMap::new();
        let mut next_variable = 16i16;
        let mut pc = 0usize;

        for _ in 0..STEP_LIMIT {
            let Some(instruction) = instructions.get(pc) else {
                return;
            };

            if let Some(symbol) = instruction.strip_prefix('@') {
                self.a = resolve(symbol, &labels, &mut variables, &mut next_variable);
                pc += 1;
                continue;
            }

            let (dest, rest) = match instruction.split_once('=') {
                Some((dest, rest)) => (dest, rest),
                None => ("", instruction.as_str()),
            };
            let (comp, jump) = match rest.split_once(';') {
                Some((comp, jump)) => (comp, jump),
                None => (rest, ""),
            };

            let address = self.a as u16 as usize % RAM_SIZE;
            let value = eval_comp(comp, self.a, self.d, self.ram[address]);

            if dest.contains('M') {
                self.ram[address] = value;
            }
            if dest.contains('D') {
                self.d = value;
            }
            if dest.contains('A') {
                self.a = value;
            }

            let taken = match jump {
                "" => false,
                "JGT" => value > 0,
                "JEQ" => value == 0,
                "JGE" => value >= 0,
                "JLT" => value < 0,
                "JNE" => value != 0,
                "JLE" => value <= 0,
                "JMP" => true,
                other => panic!("unknown jump: {other}"),
            };

            if taken {
                pc = self.a as u16 as usize;
            } else {
                pc += 1;
            }
        }
    }
}

/// Strips comments and blanks, splits labels from instructions.
fn load(asm: &str) -> (Vec<String>, HashMap<String, i16>) {
    let mut instructions = Vec::new();
    let mut labels = HashMap::new();

    for raw in asm.lines() {
        let line = match raw.find("//") {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(label) = line.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
            labels.insert(label.to_string(), instructions.len() as i16);
        } else {
            instructions.push(line.to_string());
        }
    }

    (instructions, labels)
}

fn resolve(
    symbol: &str,
    labels: &HashMap<String, i16>,
    variables: &mut HashMap<String, i16>,
    next_variable: &mut i16,
) -> i16 {
    if let Ok(value) = symbol.parse::<i16>() {
        return value;
    }
    let predefined = match symbol {
        "SP" => Some(0),
        "LCL" => Some(1),
        "ARG" => Some(2),
        "THIS" => Some(3),
        "THAT" => Some(4),
        "SCREEN" => Some(16384),
        "KBD" => Some(24576),
        _ => symbol
            .strip_prefix('R')
            .and_then(|n| n.parse::<i16>().ok())
            .filter(|n| (0..=15).contains(n)),
    };
    if let Some(address) = predefined {
        return address;
    }
    if let Some(&address) = labels.get(symbol) {
        return address;
    }
    *variables.entry(symbol.to_string()).or_insert_with(|| {
        let address = *next_variable;
        *next_variable += 1;
        address
    })
}

fn eval_comp(comp: &str, a: i16, d: i16, m: i16) -> i16 {
    match comp {
        "0" => 0,
        "1" => 1,
        "-1" => -1,
        "D" => d,
        "A" => a,
        "M" => m,
        "!D" => !d,
        "!A" => !a,
        "!M" => !m,
        "-D" => d.wrapping_neg(),
        "-A" => a.wrapping_neg(),
        "-M" => m.wrapping_neg(),
        "D+1" => d.wrapping_add(1),
        "A+1" => a.wrapping_add(1),
        "M+1" => m.wrapping_add(1),
        "D-1" => d.wrapping_sub(1),
        "A-1" => a.wrapping_sub(1),
        "M-1" => m.wrapping_sub(1),
        "D+A" => d.wrapping_add(a),
        "D+M" => d.wrapping_add(m),
        "D-A" => d.wrapping_sub(a),
        "D-M" => d.wrapping_sub(m),
        "A-D" => a.wrapping_sub(d),
        "M-D" => m.wrapping_sub(d),
        "D&A" => d & a,
        "D&M" => d & m,
        "D|A" => d | a,
        "D|M" => d | m,
        "D<<" => d.wrapping_shl(1),
        "A<<" => a.wrapping_shl(1),
        "M<<" => m.wrapping_shl(1),
        "D>>" => d >> 1,
        "A>>" => a >> 1,
        "M>>" => m >> 1,
        other => panic!("unknown comp: {other}"),
    }
}

fn run_vm(source: &str) -> Machine {
    let asm = translate(source, "Test", false).expect("translation failed");
    let mut machine = Machine::new();
    machine.run(&asm);
    machine
}

#[test]
fn add_leaves_sum_on_stack() {
    let machine = run_vm("push constant 7\npush constant 8\nadd\n");
    assert_eq!(machine.sp(), 257);
    assert_eq!(machine.stack_top(), 15);
}

#[test]
fn sub_and_neg() {
    let machine = run_vm("push constant 5\npush constant 9\nsub\nneg\n");
    assert_eq!(machine.sp(), 257);
    assert_eq!(machine.stack_top(), 4);
}

#[test]
fn bitwise_ops() {
    let machine = run_vm("push constant 12\npush constant 10\nand\n");
    assert_eq!(machine.stack_top(), 8);

    let machine = run_vm("push constant 12\npush constant 10\nor\n");
    assert_eq!(machine.stack_top(), 14);

    let machine = run_vm("push constant 0\nnot\n");
    assert_eq!(machine.stack_top(), -1);
}

#[test]
fn shift_ops() {
    let machine = run_vm("push constant 3\nshiftleft\n");
    assert_eq!(machine.stack_top(), 6);

    let machine = run_vm("push constant 6\nshiftright\n");
    assert_eq!(machine.stack_top(), 3);
}

#[test]
fn eq_true_and_false() {
    let machine = run_vm("push constant 17\npush constant 17\neq\n");
    assert_eq!(machine.stack_top(), -1);

    let machine = run_vm("push constant 17\npush constant 18\neq\n");
    assert_eq!(machine.stack_top(), 0);
}

#[test]
fn lt_survives_intermediate_overflow() {
    // 1 - 32767 = -32766; comparing it against 0 must not be fooled by
    // the wrapped subtraction a naive lt would perform.
    let source = "\
push constant 1
push constant 32767
neg
neg
sub
push constant 0
lt
";
    let machine = run_vm(source);
    assert_eq!(machine.sp(), 257);
    assert_eq!(machine.stack_top(), -1);
}

#[test]
fn comparisons_at_the_16_bit_extremes() {
    // x = 32767, y = -32768: x - y wraps to -1, so the sign-split path is
    // the only way to answer correctly.
    let extremes = "\
push constant 32767
push constant 32767
neg
push constant 1
sub
";

    let machine = run_vm(&format!("{extremes}gt\n"));
    assert_eq!(machine.stack_top(), -1, "32767 > -32768");

    let machine = run_vm(&format!("{extremes}lt\n"));
    assert_eq!(machine.stack_top(), 0, "32767 < -32768 is false");
}

#[test]
fn ordered_comparisons_with_equal_signs() {
    let machine = run_vm("push constant 3\npush constant 4\nlt\n");
    assert_eq!(machine.stack_top(), -1);

    let machine = run_vm("push constant 4\npush constant 4\nlt\n");
    assert_eq!(machine.stack_top(), 0);

    let machine = run_vm("push constant 9\npush constant 2\ngt\n");
    assert_eq!(machine.stack_top(), -1);
}

#[test]
fn segments_round_trip_values() {
    // Point LCL and ARG at scratch areas, then move a value through them.
    let source = "\
push constant 300
pop pointer 0
push constant 400
pop pointer 1
push constant 10
pop this 2
push this 2
pop that 6
push that 6
pop temp 6
push temp 6
";
    let machine = run_vm(source);
    assert_eq!(machine.ram[3], 300);
    assert_eq!(machine.ram[4], 400);
    assert_eq!(machine.ram[302], 10);
    assert_eq!(machine.ram[406], 10);
    assert_eq!(machine.ram[11], 10);
    assert_eq!(machine.stack_top(), 10);
}

#[test]
fn static_slots_hold_values() {
    let source = "\
push constant 111
pop static 0
push constant 222
pop static 1
push static 0
push static 1
add
";
    let machine = run_vm(source);
    assert_eq!(machine.stack_top(), 333);
}

#[test]
fn if_goto_branches_on_nonzero() {
    let taken = "\
push constant 1
if-goto SKIP
push constant 111
label SKIP
push constant 7
";
    let machine = run_vm(taken);
    // The push of 111 was skipped.
    assert_eq!(machine.sp(), 257);
    assert_eq!(machine.stack_top(), 7);

    let not_taken = "\
push constant 0
if-goto SKIP
push constant 111
label SKIP
push constant 7
";
    let machine = run_vm(not_taken);
    assert_eq!(machine.sp(), 258);
    assert_eq!(machine.stack_top(), 7);
    assert_eq!(machine.ram[256], 111);
}

#[test]
fn call_and_return_with_zero_args_preserves_return_address() {
    // With n = 0, ARG points at the return-address slot itself; the
    // return value overwrites it, so the return sequence must have read
    // it already.
    let source = "\
function Main.main 0
call F.g 0
label HALT
goto HALT
function F.g 0
push constant 42
return
";
    let asm = translate(source, "Test", false).unwrap();
    let mut machine = Machine::new();
    machine.run(&asm);

    assert_eq!(machine.sp(), 257);
    assert_eq!(machine.stack_top(), 42);
}

#[test]
fn locals_are_zero_initialized_and_frames_nest() {
    // Full program shape: the bootstrap calls Sys.init, which drives
    // Main.main, which calls a helper.
    let source = "\
function Sys.init 0
call Main.main 0
label HALT
goto HALT
function Main.main 2
push constant 10
pop local 0
push local 0
push local 1
add
call F.double 1
return
function F.double 0
push argument 0
push argument 0
add
return
";
    let asm = translate(source, "Sys", true).unwrap();
    let mut machine = Machine::new();
    machine.run(&asm);

    // local 1 was never written, so the sum is 10; doubling gives 20.
    assert_eq!(machine.stack_top(), 20);
}
