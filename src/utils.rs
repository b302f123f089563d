use std::fs;

use crate::constants::NUM_VIRTUAL_PAGES;
use crate::process::{Process, Vma};
use crate::rand_generator::RandGenerator;
use crate::simulator::Instruction;

pub fn read_input_file(filename: &str) -> Result<(Vec<Process>, Vec<Instruction>), String> {
    let contents = fs::read_to_string(filename)
        .map_err(|e| format!("failed to open {}: {}", filename, e))?;
    parse_input(&contents)
}

/// Parses a trace: process count, per-process VMA blocks, then instruction
/// lines. Comment (`#`) and blank lines are ignored anywhere.
pub fn parse_input(contents: &str) -> Result<(Vec<Process>, Vec<Instruction>), String> {
    let mut lines = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let num_processes: usize = lines
        .next()
        .ok_or_else(|| "missing process count".to_string())?
        .parse()
        .map_err(|e| format!("bad process count: {}", e))?;

    let mut processes = Vec::with_capacity(num_processes);
    for pid in 0..num_processes {
        let num_vmas: usize = lines
            .next()
            .ok_or_else(|| format!("process {}: missing vma count", pid))?
            .parse()
            .map_err(|e| format!("process {}: bad vma count: {}", pid, e))?;

        let mut vmas = Vec::with_capacity(num_vmas);
        for _ in 0..num_vmas {
            let line = lines
                .next()
                .ok_or_else(|| format!("process {}: missing vma line", pid))?;
            let mut fields = line.split_whitespace();
            let mut field = |name: &str| -> Result<usize, String> {
                fields
                    .next()
                    .ok_or_else(|| format!("process {}: vma line missing {}", pid, name))?
                    .parse()
                    .map_err(|e| format!("process {}: bad vma {}: {}", pid, name, e))
            };
            let start_vpage = field("start_vpage")?;
            let end_vpage = field("end_vpage")?;
            let write_protected = field("write_protected")?;
            let file_mapped = field("file_mapped")?;
            if start_vpage > end_vpage || end_vpage >= NUM_VIRTUAL_PAGES {
                return Err(format!(
                    "process {}: invalid vma range {} {}",
                    pid, start_vpage, end_vpage
                ));
            }
            vmas.push(Vma {
                start_vpage,
                end_vpage,
                write_protected: write_protected == 1,
                file_mapped: file_mapped == 1,
            });
        }
        processes.push(Process::new(pid, vmas));
    }

    let mut instructions = Vec::new();
    for line in lines {
        let mut parts = line.split_whitespace();
        let opcode = parts.next().unwrap_or("");
        let operand: usize = parts
            .next()
            .ok_or_else(|| format!("instruction '{}': missing operand", line))?
            .parse()
            .map_err(|e| format!("instruction '{}': bad operand: {}", line, e))?;

        let inst = match opcode {
            "c" | "e" => {
                if operand >= num_processes {
                    return Err(format!(
                        "instruction '{}': no such process (have {})",
                        line, num_processes
                    ));
                }
                if opcode == "c" {
                    Instruction::ContextSwitch(operand)
                } else {
                    Instruction::Exit(operand)
                }
            }
            "r" | "w" => {
                if operand >= NUM_VIRTUAL_PAGES {
                    return Err(format!(
                        "instruction '{}': vpage out of range 0..{}",
                        line,
                        NUM_VIRTUAL_PAGES - 1
                    ));
                }
                if opcode == "r" {
                    Instruction::Read(operand)
                } else {
                    Instruction::Write(operand)
                }
            }
            _ => return Err(format!("instruction '{}': unknown opcode", line)),
        };
        instructions.push(inst);
    }

    Ok((processes, instructions))
}

pub fn read_random_file(filename: &str) -> Result<RandGenerator, String> {
    let contents = fs::read_to_string(filename)
        .map_err(|e| format!("failed to open {}: {}", filename, e))?;
    parse_random(&contents)
}

/// The first integer is the value count, followed by that many values.
pub fn parse_random(contents: &str) -> Result<RandGenerator, String> {
    let mut tokens = contents.split_whitespace();
    let count: usize = tokens
        .next()
        .ok_or_else(|| "random file is empty".to_string())?
        .parse()
        .map_err(|e| format!("bad random count: {}", e))?;

    let values = tokens
        .take(count)
        .map(|t| t.parse::<i64>().map_err(|e| format!("bad random value '{}': {}", t, e)))
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Err("random file has no values".to_string());
    }
    Ok(RandGenerator::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_processes_and_instructions() {
        let input = "\
# process count
2
# process 0
1
0 15 0 0
# process 1
2
0 7 1 0
8 9 0 1
# trace
c 0
r 3
w 3
e 0
";
        let (processes, instructions) = parse_input(input).unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[1].vmas.len(), 2);
        assert!(processes[1].vmas[0].write_protected);
        assert!(processes[1].vmas[1].file_mapped);
        assert_eq!(
            instructions,
            vec![
                Instruction::ContextSwitch(0),
                Instruction::Read(3),
                Instruction::Write(3),
                Instruction::Exit(0),
            ]
        );
    }

    #[test]
    fn blank_lines_are_ignored() {
        let input = "\n1\n\n1\n0 0 0 0\n\nc 0\n\nr 0\n";
        let (processes, instructions) = parse_input(input).unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(instructions.len(), 2);
    }

    #[test]
    fn rejects_bad_process_count() {
        let err = parse_input("x\n").unwrap_err();
        assert!(err.contains("process count"));
    }

    #[test]
    fn rejects_short_vma_line() {
        let err = parse_input("1\n1\n0 0 0\nc 0\n").unwrap_err();
        assert!(err.contains("file_mapped"));
    }

    #[test]
    fn rejects_vpage_out_of_range() {
        let err = parse_input("1\n1\n0 63 0 0\nc 0\nr 64\n").unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn rejects_unknown_process_operand() {
        let err = parse_input("1\n1\n0 0 0 0\nc 1\n").unwrap_err();
        assert!(err.contains("no such process"));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = parse_input("1\n1\n0 0 0 0\nx 0\n").unwrap_err();
        assert!(err.contains("unknown opcode"));
    }

    #[test]
    fn random_values_beyond_count_are_dropped() {
        let gen = parse_random("2\n10\n20\n30\n").unwrap();
        let mut gen = gen;
        assert_eq!(gen.next_in(100), 11);
        assert_eq!(gen.next_in(100), 21);
        // wrapped, never sees 30
        assert_eq!(gen.next_in(100), 11);
    }

    #[test]
    fn rejects_empty_random_file() {
        assert!(parse_random("").is_err());
        assert!(parse_random("0\n").is_err());
    }
}
