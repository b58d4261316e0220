//! Reference executor for compiled stylesheets.
//!
//! Output is plain text. Scheduled calls are handed to a [`Scheduler`];
//! running them later, and cancelling them, is the scheduler's business.

use crate::error::ExecutionError;
use crate::instruction::{
    AnalyzeStringInstruction, CallTemplateInstruction, Executable, Instruction, NamedTemplate,
    ParamValue, ScheduleInstruction, WithParam,
};
use log::{debug, trace};
use scrivener_xpath::pattern::matches_empty_string;
use scrivener_xpath::{
    AtomicValue, DynamicContext, ItemType, Sequence, SequenceType, compile_regex, evaluate,
    evaluate_single, string_join,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 512;

/// A template call to run after `delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCall {
    pub delay: Duration,
    pub template: String,
    pub params: HashMap<String, Sequence>,
    pub context_item: Option<AtomicValue>,
}

pub trait Scheduler {
    fn schedule(&mut self, call: ScheduledCall);
}

/// Keeps scheduled calls in order until they are drained.
#[derive(Debug, Default)]
pub struct QueueScheduler {
    queue: Vec<ScheduledCall>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<ScheduledCall> {
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&mut self, call: ScheduledCall) {
        self.queue.push(call);
    }
}

/// Variables and focus of one template invocation.
#[derive(Clone)]
struct Frame {
    variables: HashMap<String, Sequence>,
    context_item: Option<AtomicValue>,
    regex_groups: Vec<String>,
}

impl Frame {
    fn new(context_item: Option<AtomicValue>) -> Self {
        Self {
            variables: HashMap::new(),
            context_item,
            regex_groups: Vec::new(),
        }
    }

    fn context(&self) -> DynamicContext<'_> {
        DynamicContext::new(&self.variables)
            .with_context_item(self.context_item.clone())
            .with_regex_groups(&self.regex_groups)
    }
}

/// A call left for the caller's loop to run in place of its own frame.
struct TailCall {
    template: String,
    params: HashMap<String, Sequence>,
    context_item: Option<AtomicValue>,
}

pub struct Executor<'e> {
    executable: &'e Executable,
    scheduler: &'e mut dyn Scheduler,
    max_depth: usize,
    depth: usize,
}

impl<'e> Executor<'e> {
    pub fn new(executable: &'e Executable, scheduler: &'e mut dyn Scheduler) -> Self {
        Self {
            executable,
            scheduler,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runs the named template and returns its text output.
    pub fn call_template(
        &mut self,
        name: &str,
        params: HashMap<String, Sequence>,
        context_item: Option<AtomicValue>,
    ) -> Result<String, ExecutionError> {
        let mut out = String::new();
        self.invoke(
            TailCall {
                template: name.to_string(),
                params,
                context_item,
            },
            &mut out,
        )?;
        Ok(out)
    }

    /// Runs a call taken from a [`Scheduler`].
    pub fn run_scheduled(&mut self, call: ScheduledCall) -> Result<String, ExecutionError> {
        debug!("Running scheduled call of '{}'", call.template);
        self.call_template(&call.template, call.params, call.context_item)
    }

    /// Runs one call, then any tail calls it leaves behind, in a single frame
    /// of the Rust stack.
    fn invoke(&mut self, call: TailCall, out: &mut String) -> Result<(), ExecutionError> {
        if self.depth >= self.max_depth {
            return Err(ExecutionError::DepthExceeded(self.max_depth));
        }
        self.depth += 1;

        let mut next = Some(call);
        let mut result = Ok(());
        while let Some(call) = next.take() {
            trace!("Entering template '{}'", call.template);
            match self.enter(call, out) {
                Ok(tail) => next = tail,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        self.depth -= 1;
        result
    }

    fn enter(&mut self, call: TailCall, out: &mut String) -> Result<Option<TailCall>, ExecutionError> {
        let template: Arc<NamedTemplate> = self
            .executable
            .template(&call.template)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownTemplate(call.template.clone()))?;

        let mut frame = Frame::new(call.context_item);
        let mut supplied = call.params;
        for param in &template.params {
            let value = match supplied.remove(&param.name) {
                Some(value) => value,
                None if param.required => {
                    return Err(ExecutionError::MissingParameter {
                        template: template.name.clone(),
                        param: param.name.clone(),
                    });
                }
                None => self.default_value(&param.default, param.as_type.is_some(), &frame)?,
            };
            if let Some(as_type) = param.as_type {
                check_value(&value, as_type, &param.name)?;
            }
            frame.variables.insert(param.name.clone(), value);
        }

        self.execute(&template.body, &mut frame, out, true)
    }

    fn default_value(
        &mut self,
        default: &ParamValue,
        typed: bool,
        frame: &Frame,
    ) -> Result<Sequence, ExecutionError> {
        match default {
            ParamValue::Select(expr) => Ok(evaluate(expr, &frame.context())?),
            ParamValue::Content(body) => {
                let mut text = String::new();
                let mut inner = frame.clone();
                self.execute(body, &mut inner, &mut text, false)?;
                Ok(vec![AtomicValue::String(text)])
            }
            ParamValue::Absent if typed => Ok(Vec::new()),
            ParamValue::Absent => Ok(vec![AtomicValue::String(String::new())]),
        }
    }

    /// Executes `instruction`. In tail position a tail-call-enabled call is
    /// returned for the caller to run instead of being run here.
    fn execute(
        &mut self,
        instruction: &Instruction,
        frame: &mut Frame,
        out: &mut String,
        tail: bool,
    ) -> Result<Option<TailCall>, ExecutionError> {
        match instruction {
            Instruction::Sequence(items) => {
                let last = items.len().saturating_sub(1);
                for (i, item) in items.iter().enumerate() {
                    if let Some(call) = self.execute(item, frame, out, tail && i == last)? {
                        return Ok(Some(call));
                    }
                }
                Ok(None)
            }
            Instruction::Text(text) => {
                out.push_str(text);
                Ok(None)
            }
            Instruction::ValueOf { select, separator } => {
                let cx = frame.context();
                let value = evaluate(select, &cx)?;
                let separator = separator.evaluate(&cx)?;
                out.push_str(&string_join(&value, &separator));
                Ok(None)
            }
            Instruction::CallTemplate(call) => {
                let next = self.prepare_call(call, frame)?;
                if tail && call.tail_call {
                    return Ok(Some(next));
                }
                self.invoke(next, out)?;
                Ok(None)
            }
            Instruction::Schedule(schedule) => {
                self.schedule(schedule, frame)?;
                Ok(None)
            }
            Instruction::AnalyzeString(analyze) => {
                self.analyze_string(analyze, frame, out)?;
                Ok(None)
            }
            Instruction::Empty => Ok(None),
        }
    }

    fn prepare_call(
        &mut self,
        call: &CallTemplateInstruction,
        frame: &Frame,
    ) -> Result<TailCall, ExecutionError> {
        let mut params = HashMap::with_capacity(call.params.len());
        for WithParam { name, value } in &call.params {
            params.insert(name.clone(), self.default_value(value, false, frame)?);
        }
        Ok(TailCall {
            template: call.name.clone(),
            params,
            context_item: frame.context_item.clone(),
        })
    }

    fn schedule(&mut self, schedule: &ScheduleInstruction, frame: &Frame) -> Result<(), ExecutionError> {
        let delay = match &schedule.wait {
            Some(wait) => match evaluate_single(wait, &frame.context())?.cast_to(ItemType::Integer)? {
                AtomicValue::Integer(ms) => Duration::from_millis(ms.max(0) as u64),
                other => {
                    return Err(ExecutionError::dynamic(
                        "XPTY0004",
                        format!("wait must be an integer, got '{}'", other),
                    ));
                }
            },
            None => Duration::ZERO,
        };

        let call = self.prepare_call(&schedule.call, frame)?;
        debug!("Scheduling '{}' after {:?}", call.template, delay);
        self.scheduler.schedule(ScheduledCall {
            delay,
            template: call.template,
            params: call.params,
            context_item: call.context_item,
        });
        Ok(())
    }

    fn analyze_string(
        &mut self,
        analyze: &AnalyzeStringInstruction,
        frame: &mut Frame,
        out: &mut String,
    ) -> Result<(), ExecutionError> {
        let (input, pattern, flags) = {
            let cx = frame.context();
            let input = string_join(&evaluate(&analyze.input, &cx)?, " ");
            (input, analyze.regex.evaluate(&cx)?, analyze.flags.evaluate(&cx)?)
        };

        let regex = compile_regex(&pattern, &flags).map_err(|err| match err.code() {
            "FORX0001" => ExecutionError::dynamic("XTDE1145", err.to_string()),
            _ => ExecutionError::dynamic("XTDE1140", err.to_string()),
        })?;
        if matches_empty_string(&regex) {
            return Err(ExecutionError::dynamic(
                "XTDE1150",
                format!("The regular expression '{}' matches a zero-length string", pattern),
            ));
        }

        let saved_item = frame.context_item.take();
        let saved_groups = std::mem::take(&mut frame.regex_groups);
        let result = self.run_branches(analyze, &regex, &input, frame, out);
        frame.context_item = saved_item;
        frame.regex_groups = saved_groups;
        result
    }

    fn run_branches(
        &mut self,
        analyze: &AnalyzeStringInstruction,
        regex: &regex::Regex,
        input: &str,
        frame: &mut Frame,
        out: &mut String,
    ) -> Result<(), ExecutionError> {
        let mut last = 0;
        for captures in regex.captures_iter(input) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > last {
                self.branch(&analyze.non_matching, &input[last..whole.start()], Vec::new(), frame, out)?;
            }
            let groups = captures
                .iter()
                .map(|group| group.map_or_else(String::new, |g| g.as_str().to_string()))
                .collect();
            self.branch(&analyze.matching, whole.as_str(), groups, frame, out)?;
            last = whole.end();
        }
        if last < input.len() {
            self.branch(&analyze.non_matching, &input[last..], Vec::new(), frame, out)?;
        }
        Ok(())
    }

    fn branch(
        &mut self,
        body: &Option<Box<Instruction>>,
        substring: &str,
        groups: Vec<String>,
        frame: &mut Frame,
        out: &mut String,
    ) -> Result<(), ExecutionError> {
        let Some(body) = body else {
            return Ok(());
        };
        frame.context_item = Some(AtomicValue::String(substring.to_string()));
        frame.regex_groups = groups;
        self.execute(body, frame, out, false)?;
        Ok(())
    }
}

fn check_value(value: &Sequence, required: SequenceType, param: &str) -> Result<(), ExecutionError> {
    let fits = required.cardinality.matches(value.len())
        && value.iter().all(|item| required.item_type.matches(item));
    if fits {
        Ok(())
    } else {
        Err(ExecutionError::dynamic(
            "XTTE0590",
            format!("Value supplied for ${} does not match required type {}", param, required),
        ))
    }
}
