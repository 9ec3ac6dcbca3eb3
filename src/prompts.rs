//! The instruction prompt sent to the generation provider.
//!
//! The prompt is the contract for the completion format: it names the five
//! CSV columns, the allowed assignment types and the date rules, and asks for
//! CSV content only. [`crate::pipeline::fence`] relies on that last point;
//! models still wrap the answer in a ```` ```csv ```` fence, which is stripped.
//!
//! Callers can override the instruction via [`crate::config::PipelineConfig::prompt`].

/// Header row every generated CSV is expected to start with.
pub const CSV_HEADER: &str = "Due Date,Class,Assignment Name,Assignment Type,Checkbox";

/// Categories the model may put in the `Assignment Type` column.
pub const ASSIGNMENT_TYPES: [&str; 6] = ["Homework", "Reading", "Project", "Exam", "Lecture", "Lab"];

/// Default instruction prompt. The OCR markdown is appended after it.
pub const ASSIGNMENT_PROMPT: &str = r#"Task: Extract ALL assignments, exams, and course schedule items from the Markdown text below and convert them into a structured CSV format.
Context: I need to organize my academic schedule from various classes into a spreadsheet-compatible format. The Markdown contains course schedules, assignment information, due dates, class names, and other academic events. The information may be presented in different formats including tables, lists, and paragraphs.

Format: Generate a CSV file with the following columns:
1. Due Date (in MM/DD/YYYY format; if only day of week is given, use the date from the course schedule)
2. Class (the course name or code)
3. Assignment Name (the title or description of the assignment, topic, or event)
4. Assignment Type (categorize each as one of: Homework, Reading, Project, Exam, Lecture, Lab)
5. Checkbox (include "[ ]" for each item to track completion)

Special Instructions:
- TABLES: Parse all tabular data. Tables often contain the course schedule with dates and topics.
- Convert all table rows to individual entries in the CSV.
- For course schedule tables, categorize topics/chapters as "Lecture" type.
- If a row contains "EXAM", "Test", "Quiz", or "Final", categorize it as "Exam" type.
- When only day abbreviations are given (M, T, W, Th, F), use the corresponding date if available.
- Include ALL dates and events found in the document, not just explicit assignments.

Example of expected output for mixed content including tables:
Due Date,Class,Assignment Name,Assignment Type,Checkbox
01/15/2025,CSE260,Propositional Logic,Lecture,[ ]
01/22/2025,CSE260,Propositional Equivalences,Lecture,[ ]
02/26/2025,CSE260,EXAM 1,Exam,[ ]
03/26/2025,CSE260,EXAM 2,Exam,[ ]
04/30/2025,CSE260,FINAL EXAM,Exam,[ ]
Wednesdays,CSE260,Weekly Homework,Homework,[ ]

Instructions:
1. Analyze ALL content including tables, lists, and paragraphs
2. Extract every date, topic, and academic event
3. For tables, convert each row to a CSV entry
4. Format the output exactly as shown in the example
5. If a specific date isn't given but can be inferred from context, use the inferred date
6. Do not include any explanations or additional text in your response, only the CSV content

Here's the Markdown to extract from:
"#;

/// Build the full generation prompt: instruction followed by the OCR text.
pub fn build_prompt(combined_text: &str, instruction: Option<&str>) -> String {
    let instruction = instruction.unwrap_or(ASSIGNMENT_PROMPT);
    let mut prompt = String::with_capacity(instruction.len() + combined_text.len() + 1);
    prompt.push_str(instruction);
    if !instruction.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str(combined_text);
    prompt
}
