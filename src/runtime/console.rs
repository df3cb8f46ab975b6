// Captured standard streams for executed programs

use std::collections::VecDeque;

/// Output written by `printf` and the integers `scanf` reads
#[derive(Debug, Clone, Default)]
pub struct Console {
    output: String,
    input: VecDeque<i32>,
}

impl Console {
    pub fn new() -> Self {
        Console::default()
    }

    /// Console whose `scanf` calls read `input` in order
    pub fn with_input(input: impl IntoIterator<Item = i32>) -> Self {
        Console {
            output: String::new(),
            input: input.into_iter().collect(),
        }
    }

    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Next integer of input, `None` at end of input
    pub fn read_int(&mut self) -> Option<i32> {
        self.input.pop_front()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Output split into lines, without a trailing empty line
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lines() {
        let mut console = Console::new();
        console.print("1\n");
        console.print("a");
        console.print("b\n");
        assert_eq!(console.output(), "1\nab\n");
        assert_eq!(console.lines(), vec!["1", "ab"]);
    }

    #[test]
    fn test_input_in_order() {
        let mut console = Console::with_input([4, -2]);
        assert_eq!(console.read_int(), Some(4));
        assert_eq!(console.remaining_input(), 1);
        assert_eq!(console.read_int(), Some(-2));
        assert_eq!(console.read_int(), None);
    }
}
