use crate::test_helpers::{codes, compile, compile_with, main_template, run_error, run_main, stylesheet};

mod schedule_tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::error::ErrorKind;
    use crate::executor::{Executor, QueueScheduler};
    use crate::instruction::{CallTemplateInstruction, Instruction, ScheduleInstruction};
    use scrivener_xpath::Expression;
    use std::time::Duration;

    const LATER: &str = r#"<xsl:template name="later"><xsl:text>done</xsl:text></xsl:template>"#;

    fn with_later(main_body: &str) -> String {
        stylesheet(&format!(
            r#"<xsl:template name="main">{}</xsl:template>{}"#,
            main_body, LATER
        ))
    }

    fn main_body(source: &str) -> Instruction {
        let result = compile(source);
        result
            .executable()
            .and_then(|e| e.template("main"))
            .map(|t| t.body.clone())
            .expect("template main should compile")
    }

    #[test]
    fn compiles_to_a_tail_call_with_wait() {
        let source = with_later(
            r#"<ixsl:schedule-action wait="500"><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert!(result.is_success(), "{:?}", result.errors);

        assert_eq!(
            main_body(&source),
            Instruction::Schedule(ScheduleInstruction {
                call: CallTemplateInstruction {
                    name: "later".to_string(),
                    params: vec![],
                    tail_call: true,
                },
                wait: Some(Expression::integer(500)),
            })
        );
    }

    #[test]
    fn absent_wait_means_immediate() {
        let source = with_later(
            r#"<ixsl:schedule-action><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        match main_body(&source) {
            Instruction::Schedule(schedule) => {
                assert_eq!(schedule.wait, None);
                assert!(schedule.call.tail_call);
            }
            other => panic!("expected a schedule instruction, got {:?}", other),
        }
    }

    #[test]
    fn missing_call_template_is_reported_and_nothing_is_built() {
        let source = with_later(r#"<ixsl:schedule-action wait="1"/>"#);
        let result = compile(&source);

        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(
            result.errors[0].message,
            "ixsl:schedule-action must contain a single xsl:call-template instruction"
        );
        assert_eq!(result.errors[0].node.name, "ixsl:schedule-action");
        assert_eq!(main_body(&source), Instruction::Empty);
    }

    #[test]
    fn two_call_templates_are_one_error() {
        let source = with_later(
            r#"<ixsl:schedule-action><xsl:call-template name="later"/><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(main_body(&source), Instruction::Empty);
    }

    #[test]
    fn other_children_are_rejected_but_the_call_survives() {
        let source = with_later(
            r#"<ixsl:schedule-action><xsl:text>x</xsl:text><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(result.errors[0].node.name, "xsl:text");
        assert!(matches!(main_body(&source), Instruction::Schedule(_)));
    }

    #[test]
    fn fallback_child_is_ignored() {
        let source = with_later(
            r#"<ixsl:schedule-action><xsl:fallback><xsl:text>no</xsl:text></xsl:fallback><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert!(result.is_success(), "{:?}", result.errors);
        assert!(matches!(main_body(&source), Instruction::Schedule(_)));
    }

    #[test]
    fn string_wait_is_a_type_error_with_placeholder() {
        let source = with_later(
            r#"<ixsl:schedule-action wait="'soon'"><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XPTY0004"]);
        assert_eq!(result.errors[0].kind, ErrorKind::Type);
        assert!(result.errors[0].message.contains("ixsl:schedule-action/@wait"));

        match main_body(&source) {
            Instruction::Schedule(ScheduleInstruction { wait: Some(wait), .. }) => {
                assert!(wait.is_error())
            }
            other => panic!("expected a schedule with a placeholder wait, got {:?}", other),
        }
    }

    #[test]
    fn ill_typed_wait_arithmetic_is_a_type_error() {
        let source = with_later(
            r#"<ixsl:schedule-action wait="'x' + 1"><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XPTY0004"]);
        assert_eq!(result.errors[0].kind, ErrorKind::Type);
        assert!(matches!(main_body(&source), Instruction::Schedule(_)));
    }

    #[test]
    fn unknown_template_in_call_is_reported_at_the_call() {
        let source = main_template(
            r#"<ixsl:schedule-action><xsl:call-template name="nowhere"/></ixsl:schedule-action>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0650"]);
        assert_eq!(result.errors[0].node.name, "xsl:call-template");
    }

    #[test]
    fn disabled_extensions_fall_back() {
        let config = CompilerConfig {
            interactive_extensions: false,
            ..CompilerConfig::default()
        };

        let without = compile_with(
            &with_later(
                r#"<ixsl:schedule-action><xsl:call-template name="later"/></ixsl:schedule-action>"#,
            ),
            config.clone(),
        );
        assert_eq!(codes(&without), vec!["XTSE0010"]);
        assert!(without.errors[0].message.contains("has no xsl:fallback"));

        let with = compile_with(
            &main_template(
                r#"<ixsl:schedule-action wait="10"><xsl:fallback><xsl:text>no timers</xsl:text></xsl:fallback></ixsl:schedule-action>"#,
            ),
            config,
        );
        assert!(with.is_success(), "{:?}", with.errors);
        let body = with.executable().and_then(|e| e.template("main")).map(|t| t.body.clone());
        assert_eq!(body, Some(Instruction::Text("no timers".to_string())));
    }

    #[test]
    fn execution_hands_the_call_to_the_scheduler() {
        let source = stylesheet(&format!(
            r#"<xsl:template name="main"><xsl:param name="w" as="xs:integer" select="250"/><xsl:text>now</xsl:text><ixsl:schedule-action wait="$w * 2"><xsl:call-template name="later"/></ixsl:schedule-action></xsl:template>{}"#,
            LATER
        ));
        let (output, scheduled) = run_main(&source, None).unwrap();

        assert_eq!(output, "now");
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].template, "later");
        assert_eq!(scheduled[0].delay, Duration::from_millis(500));

        let executable = compile(&source).into_result().unwrap();
        let mut scheduler = QueueScheduler::new();
        let later = Executor::new(&executable, &mut scheduler)
            .run_scheduled(scheduled[0].clone())
            .unwrap();
        assert_eq!(later, "done");
    }

    #[test]
    fn negative_wait_is_immediate() {
        let source = with_later(
            r#"<ixsl:schedule-action wait="-5"><xsl:call-template name="later"/></ixsl:schedule-action>"#,
        );
        let (_, scheduled) = run_main(&source, None).unwrap();
        assert_eq!(scheduled[0].delay, Duration::ZERO);
    }

    #[test]
    fn with_params_are_evaluated_when_scheduling() {
        let source = stylesheet(
            r#"<xsl:template name="main"><ixsl:schedule-action><xsl:call-template name="greet"><xsl:with-param name="who" select="upper-case('ada')"/></xsl:call-template></ixsl:schedule-action></xsl:template><xsl:template name="greet"><xsl:param name="who"/><xsl:value-of select="concat('hi ', $who)"/></xsl:template>"#,
        );
        let (_, scheduled) = run_main(&source, None).unwrap();
        assert_eq!(
            scheduled[0].params.get("who"),
            Some(&vec![scrivener_xpath::AtomicValue::String("ADA".to_string())])
        );
    }
}

mod analyze_string_tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::error::ErrorKind;
    use crate::instruction::{AnalyzeStringInstruction, Instruction};
    use scrivener_xpath::Avt;

    const BRANCHES: &str = r#"<xsl:matching-substring><xsl:text>[</xsl:text><xsl:value-of select="."/><xsl:text>]</xsl:text></xsl:matching-substring><xsl:non-matching-substring><xsl:value-of select="."/></xsl:non-matching-substring>"#;

    fn analyze(attributes: &str, children: &str) -> String {
        main_template(&format!(
            r#"<xsl:analyze-string {}>{}</xsl:analyze-string>"#,
            attributes, children
        ))
    }

    fn instruction(source: &str) -> Option<AnalyzeStringInstruction> {
        let result = compile(source);
        match result.executable()?.template("main")?.body.clone() {
            Instruction::AnalyzeString(analyze) => Some(analyze),
            _ => None,
        }
    }

    #[test]
    fn compiles_both_branches() {
        let source = analyze(r#"select="'baaab'" regex="a+""#, BRANCHES);
        assert!(compile(&source).is_success());

        let analyze = instruction(&source).unwrap();
        assert_eq!(analyze.regex, Avt::Static("a+".to_string()));
        assert_eq!(analyze.flags, Avt::Static(String::new()));
        assert!(analyze.matching.is_some());
        assert!(analyze.non_matching.is_some());
    }

    #[test]
    fn runs_both_branches_in_order() {
        let source = analyze(r#"select="'baaab'" regex="a+""#, BRANCHES);
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "b[aaa]b");
    }

    #[test]
    fn regex_groups_are_visible_in_the_matching_branch() {
        let source = analyze(
            r#"select="'2024-10'" regex="(\d+)-(\d+)""#,
            r#"<xsl:matching-substring><xsl:value-of select="regex-group(2)"/><xsl:text>/</xsl:text><xsl:value-of select="regex-group(1)"/></xsl:matching-substring>"#,
        );
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "10/2024");
    }

    #[test]
    fn flags_apply_at_run_time() {
        let source = analyze(
            r#"select="'xAyaz'" regex="a" flags="i""#,
            r#"<xsl:matching-substring><xsl:text>*</xsl:text></xsl:matching-substring>"#,
        );
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "**");
    }

    #[test]
    fn missing_branch_output_is_dropped() {
        let source = analyze(
            r#"select="'baaab'" regex="a+""#,
            r#"<xsl:non-matching-substring><xsl:value-of select="."/></xsl:non-matching-substring>"#,
        );
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "bb");
    }

    #[test]
    fn duplicate_branch_keeps_the_first() {
        let source = analyze(
            r#"select="'baaab'" regex="a+""#,
            r#"<xsl:matching-substring><xsl:text>1</xsl:text></xsl:matching-substring><xsl:matching-substring><xsl:text>2</xsl:text></xsl:matching-substring>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(
            result.errors[0].message,
            "xsl:matching-substring element must only appear once"
        );

        let analyze = instruction(&source).unwrap();
        assert_eq!(
            analyze.matching.as_deref(),
            Some(&Instruction::Text("1".to_string()))
        );
    }

    #[test]
    fn no_branches_is_xtse1130() {
        let source = analyze(r#"select="'baaab'" regex="a+""#, "");
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE1130"]);
        assert_eq!(
            result.errors[0].message,
            "At least one xsl:matching-substring or xsl:non-matching-substring element must be present"
        );
        assert!(instruction(&source).is_none());
    }

    #[test]
    fn other_children_are_rejected() {
        let source = analyze(
            r#"select="'baaab'" regex="a+""#,
            &format!("<xsl:text>no</xsl:text>{}", BRANCHES),
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(
            result.errors[0].message,
            "Only xsl:matching-substring and xsl:non-matching-substring are allowed here"
        );
        assert!(instruction(&source).is_some());
    }

    #[test]
    fn single_matching_branch_runs_once_per_match() {
        let source = analyze(
            r#"select="'baaab'" regex="a+" flags="""#,
            r#"<xsl:matching-substring><xsl:text>M</xsl:text></xsl:matching-substring>"#,
        );
        let analyze = instruction(&source).unwrap();
        assert!(analyze.non_matching.is_none());
        assert_eq!(
            analyze.matching.as_deref(),
            Some(&Instruction::Text("M".to_string()))
        );

        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "M");

        let (output, _) = run_main(
            &self::analyze(
                r#"select="'baaabaab'" regex="a+""#,
                r#"<xsl:matching-substring><xsl:text>M</xsl:text></xsl:matching-substring>"#,
            ),
            None,
        )
        .unwrap();
        assert_eq!(output, "MM");
    }

    #[test]
    fn extended_flag_keeps_hash_literal() {
        let source = analyze(
            r#"select="'a#b a'" regex="a # b" flags="x""#,
            r#"<xsl:matching-substring><xsl:text>*</xsl:text></xsl:matching-substring><xsl:non-matching-substring><xsl:value-of select="."/></xsl:non-matching-substring>"#,
        );
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "* a");
    }

    #[test]
    fn missing_required_attributes_are_recovered() {
        let source = analyze("", r#"<xsl:matching-substring/>"#);
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0010", "XTSE0010"]);
        assert!(result.errors[0].message.contains("absence of required attribute \"select\""));
        assert!(result.errors[1].message.contains("absence of required attribute \"regex\""));

        let analyze = instruction(&source).unwrap();
        assert_eq!(analyze.regex, Avt::Static("xxx".to_string()));
    }

    #[test]
    fn fixed_flags_are_checked_at_compile_time() {
        let source = analyze(r#"select="'baaab'" regex="a+" flags="M""#, BRANCHES);
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTDE1145"]);
        assert_eq!(result.errors[0].kind, ErrorKind::Syntax);
        assert!(instruction(&source).is_none());
    }

    #[test]
    fn fixed_regex_is_checked_at_compile_time() {
        let bad = analyze(r#"select="'baaab'" regex="(a""#, BRANCHES);
        assert_eq!(codes(&compile(&bad)), vec!["XTDE1140"]);

        let empty = analyze(r#"select="'baaab'" regex="a*""#, BRANCHES);
        assert_eq!(codes(&compile(&empty)), vec!["XTDE1150"]);
    }

    #[test]
    fn static_regex_check_can_be_disabled() {
        let config = CompilerConfig {
            validate_static_regex: false,
            ..CompilerConfig::default()
        };
        let source = analyze(r#"select="'baaab'" regex="a+" flags="M""#, BRANCHES);
        assert!(compile_with(&source, config).is_success());
    }

    #[test]
    fn dynamic_flags_are_checked_at_run_time() {
        let source = stylesheet(&format!(
            r#"<xsl:template name="main"><xsl:param name="f" select="'M'"/><xsl:analyze-string select="'baaab'" regex="a+" flags="{{$f}}">{}</xsl:analyze-string></xsl:template>"#,
            BRANCHES
        ));
        assert!(compile(&source).is_success());
        assert_eq!(run_error(&source).code(), "XTDE1145");
    }

    #[test]
    fn unbalanced_braces_in_regex_are_syntax_errors() {
        let open = compile(&analyze(r#"select="'a'" regex="a{""#, BRANCHES));
        assert_eq!(codes(&open), vec!["XTSE0350"]);
        assert_eq!(open.errors[0].kind, ErrorKind::Syntax);

        let close = compile(&analyze(r#"select="'a'" regex="a}""#, BRANCHES));
        assert_eq!(codes(&close), vec!["XTSE0370"]);
    }

    #[test]
    fn failing_branch_is_dropped_alone() {
        let source = analyze(
            r#"select="'baaab'" regex="a+""#,
            r#"<xsl:matching-substring><xsl:value-of select="1 idiv 0"/></xsl:matching-substring><xsl:non-matching-substring><xsl:text>-</xsl:text></xsl:non-matching-substring>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["FOAR0001"]);
        assert_eq!(result.errors[0].kind, ErrorKind::PropagatedCompile);

        let analyze = instruction(&source).unwrap();
        assert!(analyze.matching.is_none());
        assert_eq!(
            analyze.non_matching.as_deref(),
            Some(&Instruction::Text("-".to_string()))
        );
    }

    #[test]
    fn branches_are_simplified() {
        let children = r#"<xsl:matching-substring><xsl:text>a</xsl:text><xsl:value-of select="'b'"/></xsl:matching-substring>"#;
        let source = analyze(r#"select="'x'" regex="x""#, children);
        assert_eq!(
            instruction(&source).unwrap().matching.as_deref(),
            Some(&Instruction::Text("ab".to_string()))
        );

        let config = CompilerConfig {
            simplify_branches: false,
            ..CompilerConfig::default()
        };
        let result = compile_with(&source, config);
        let body = result
            .executable()
            .and_then(|e| e.template("main"))
            .map(|t| t.body.clone());
        match body {
            Some(Instruction::AnalyzeString(analyze)) => {
                assert!(matches!(
                    analyze.matching.as_deref(),
                    Some(Instruction::Sequence(items)) if items.len() == 2
                ))
            }
            other => panic!("expected analyze-string, got {:?}", other),
        }
    }

    #[test]
    fn select_must_be_a_single_string_at_most() {
        let source = analyze(r#"select="(1, 2)" regex="a""#, BRANCHES);
        assert_eq!(codes(&compile(&source)), vec!["XPTY0004"]);
    }
}

mod call_template_tests {
    use super::*;
    use crate::error::XsltError;

    const GREET: &str = r#"<xsl:template name="greet"><xsl:param name="who" required="yes"/><xsl:param name="punct" select="'!'"/><xsl:value-of select="concat('Hello, ', $who, $punct)"/></xsl:template>"#;

    fn calling(call: &str) -> String {
        stylesheet(&format!(
            r#"<xsl:template name="main">{}</xsl:template>{}"#,
            call, GREET
        ))
    }

    #[test]
    fn passes_parameters_and_defaults() {
        let source = calling(
            r#"<xsl:call-template name="greet"><xsl:with-param name="who" select="'World'"/></xsl:call-template>"#,
        );
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "Hello, World!");
    }

    #[test]
    fn content_parameters_become_text() {
        let source = calling(
            r#"<xsl:call-template name="greet"><xsl:with-param name="who"><xsl:text>you</xsl:text></xsl:with-param><xsl:with-param name="punct">?</xsl:with-param></xsl:call-template>"#,
        );
        let (output, _) = run_main(&source, None).unwrap();
        assert_eq!(output, "Hello, you?");
    }

    #[test]
    fn undeclared_parameter_is_xtse0680() {
        let source = calling(
            r#"<xsl:call-template name="greet"><xsl:with-param name="who" select="1"/><xsl:with-param name="mood" select="2"/></xsl:call-template>"#,
        );
        assert_eq!(codes(&compile(&source)), vec!["XTSE0680"]);
    }

    #[test]
    fn missing_required_parameter_is_xtse0690() {
        let source = calling(r#"<xsl:call-template name="greet"/>"#);
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0690"]);
        assert!(result.errors[0].message.contains("$who"));
    }

    #[test]
    fn duplicate_with_param_is_xtse0670() {
        let source = calling(
            r#"<xsl:call-template name="greet"><xsl:with-param name="who" select="1"/><xsl:with-param name="who" select="2"/></xsl:call-template>"#,
        );
        assert_eq!(codes(&compile(&source)), vec!["XTSE0670"]);
    }

    #[test]
    fn duplicate_template_is_xtse0660() {
        let source = stylesheet(&format!("{}{}", GREET, GREET));
        assert_eq!(codes(&compile(&source)), vec!["XTSE0660"]);
    }

    #[test]
    fn duplicate_param_is_xtse0580() {
        let source = stylesheet(
            r#"<xsl:template name="t"><xsl:param name="a"/><xsl:param name="a"/></xsl:template>"#,
        );
        assert_eq!(codes(&compile(&source)), vec!["XTSE0580"]);
    }

    #[test]
    fn with_param_is_checked_against_declared_type() {
        let source = stylesheet(
            r#"<xsl:template name="main"><xsl:call-template name="n"><xsl:with-param name="count" select="'many'"/></xsl:call-template></xsl:template><xsl:template name="n"><xsl:param name="count" as="xs:integer" required="yes"/><xsl:value-of select="$count"/></xsl:template>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XPTY0004"]);
        assert!(result.errors[0].message.contains("xsl:with-param/@select"));
    }

    #[test]
    fn param_with_select_and_content_is_xtse0620() {
        let source = stylesheet(
            r#"<xsl:template name="t"><xsl:param name="a" select="1"><xsl:text>1</xsl:text></xsl:param></xsl:template>"#,
        );
        assert_eq!(codes(&compile(&source)), vec!["XTSE0620"]);
    }

    #[test]
    fn required_param_with_default_is_an_error() {
        let source = stylesheet(
            r#"<xsl:template name="t"><xsl:param name="a" required="yes" select="1"/></xsl:template>"#,
        );
        assert_eq!(codes(&compile(&source)), vec!["XTSE0010"]);
    }

    #[test]
    fn undeclared_variable_is_reported() {
        let source = stylesheet(
            r#"<xsl:template name="t"><xsl:value-of select="$nope"/></xsl:template>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XPST0008"]);

        match result.into_result() {
            Err(XsltError::Static(errors)) => assert_eq!(errors.0.len(), 1),
            other => panic!("expected static errors, got {:?}", other),
        }
    }
}

mod validation_tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::error::ErrorKind;

    #[test]
    fn several_independent_errors_surface_in_one_pass() {
        let source = main_template(
            r#"<xsl:value-of select="1" colour="red"/><ixsl:schedule-action wait="1"/><xsl:analyze-string select="'a'" regex="a"/>"#,
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0090", "XTSE0010", "XTSE1130"]);
        assert_eq!(result.errors[0].kind, ErrorKind::Structural);
    }

    #[test]
    fn unknown_attribute_does_not_stop_binding() {
        let source = main_template(r#"<xsl:value-of select="'kept'" colour="red"/>"#);
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE0090"]);
        assert_eq!(
            result.errors[0].message,
            "Attribute colour is not allowed on element xsl:value-of"
        );
        let body = result.executable().and_then(|e| e.template("main")).map(|t| t.body.clone());
        assert!(matches!(
            body,
            Some(crate::instruction::Instruction::ValueOf { .. })
        ));
    }

    #[test]
    fn max_errors_caps_the_record() {
        let source = main_template(
            r#"<xsl:value-of select="1" colour="red"/><ixsl:schedule-action wait="1"/><xsl:analyze-string select="'a'" regex="a"/>"#,
        );
        let config = CompilerConfig {
            max_errors: Some(1),
            ..CompilerConfig::default()
        };
        let result = compile_with(&source, config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.suppressed, 2);
        assert!(!result.is_success());
    }

    #[test]
    fn suppressed_errors_still_fail_the_conversion() {
        let source = main_template(r#"<xsl:analyze-string select="'x'" regex="x"/>"#);
        let config = CompilerConfig {
            max_errors: Some(0),
            ..CompilerConfig::default()
        };
        let result = compile_with(&source, config);
        assert!(result.errors.is_empty());
        assert_eq!(result.suppressed, 1);
        assert!(!result.is_success());

        let err = result.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: 1 static error(s) found but not recorded"
        );
    }

    #[test]
    fn literal_result_elements_need_a_fallback() {
        let result = compile(&main_template("<out/>"));
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(result.errors[0].node.name, "out");
    }

    #[test]
    fn empty_instruction_rejects_content() {
        let result = compile(&main_template(
            r#"<xsl:value-of select="1"><xsl:text>x</xsl:text></xsl:value-of>"#,
        ));
        assert_eq!(codes(&result), vec!["XTSE0260"]);
    }

    #[test]
    fn text_is_not_allowed_in_call_template() {
        let result = compile(&stylesheet(
            r#"<xsl:template name="main"><xsl:call-template name="t">oops</xsl:call-template></xsl:template><xsl:template name="t"/>"#,
        ));
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(
            result.errors[0].message,
            "Text is not allowed as a child of xsl:call-template"
        );
    }

    #[test]
    fn declarations_are_not_instructions() {
        let result = compile(&main_template(r#"<xsl:matching-substring/>"#));
        assert_eq!(codes(&result), vec!["XTSE0010"]);
    }

    #[test]
    fn params_must_come_first() {
        let result = compile(&stylesheet(
            r#"<xsl:template name="t"><xsl:text>x</xsl:text><xsl:param name="late"/></xsl:template>"#,
        ));
        assert_eq!(codes(&result), vec!["XTSE0010"]);
        assert_eq!(result.errors[0].node.name, "xsl:param");
    }

    #[test]
    fn integer_for_a_string_slot_is_a_type_error() {
        let result = compile(&main_template(
            r#"<xsl:analyze-string select="7" regex="7"><xsl:matching-substring><xsl:text>seven</xsl:text></xsl:matching-substring></xsl:analyze-string>"#,
        ));
        assert_eq!(codes(&result), vec!["XPTY0004"]);
    }

    #[test]
    fn root_must_be_a_stylesheet_for_an_executable() {
        let source = format!(
            r#"<xsl:value-of xmlns:xsl="{}" select="1"/>"#,
            crate::tree::XSL_NS
        );
        let result = compile(&source);
        assert!(result.errors.is_empty());
        assert!(result.instruction().is_some());
        assert!(result.into_result().is_err());
    }

    #[test]
    fn error_locations_point_at_the_element() {
        let source = format!(
            "<xsl:stylesheet version=\"3.0\" xmlns:xsl=\"{}\">\n  <xsl:template name=\"main\">\n    <xsl:analyze-string select=\"'a'\" regex=\"a\"/>\n  </xsl:template>\n</xsl:stylesheet>",
            crate::tree::XSL_NS
        );
        let result = compile(&source);
        assert_eq!(codes(&result), vec!["XTSE1130"]);
        assert_eq!(result.errors[0].node.location.line, 3);
        assert_eq!(result.errors[0].node.location.column, 5);
    }
}

mod determinism_tests {
    use super::*;

    #[test]
    fn same_input_gives_same_tree_and_errors() {
        let source = main_template(
            r#"<xsl:value-of select="1" colour="red"/><xsl:analyze-string select="'baaab'" regex="a+"><xsl:matching-substring><xsl:value-of select="."/></xsl:matching-substring></xsl:analyze-string><ixsl:schedule-action wait="'x'"/>"#,
        );
        assert_eq!(compile(&source), compile(&source));
    }
}

mod execution_tests {
    use crate::error::ExecutionError;
    use crate::executor::{Executor, QueueScheduler};
    use crate::instruction::{CallTemplateInstruction, Executable, Instruction, NamedTemplate};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    fn chain(tail_call: bool) -> Executable {
        let mut templates = BTreeMap::new();
        templates.insert(
            "main".to_string(),
            Arc::new(NamedTemplate {
                name: "main".to_string(),
                params: vec![],
                body: Instruction::CallTemplate(CallTemplateInstruction {
                    name: "next".to_string(),
                    params: vec![],
                    tail_call,
                }),
            }),
        );
        templates.insert(
            "next".to_string(),
            Arc::new(NamedTemplate {
                name: "next".to_string(),
                params: vec![],
                body: Instruction::Text("reached".to_string()),
            }),
        );
        Executable { templates }
    }

    #[test]
    fn tail_calls_reuse_the_frame() {
        let executable = chain(true);
        let mut scheduler = QueueScheduler::new();
        let output = Executor::new(&executable, &mut scheduler)
            .with_max_depth(1)
            .call_template("main", HashMap::new(), None)
            .unwrap();
        assert_eq!(output, "reached");
    }

    #[test]
    fn ordinary_calls_count_against_depth() {
        let executable = chain(false);
        let mut scheduler = QueueScheduler::new();
        let err = Executor::new(&executable, &mut scheduler)
            .with_max_depth(1)
            .call_template("main", HashMap::new(), None)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::DepthExceeded(1)));
        assert_eq!(err.code(), "SXLM0001");
    }

    #[test]
    fn unknown_template_fails() {
        let executable = chain(false);
        let mut scheduler = QueueScheduler::new();
        let mut executor = Executor::new(&executable, &mut scheduler);
        assert_eq!(
            executor
                .call_template("missing", HashMap::new(), None)
                .unwrap_err()
                .code(),
            "XTDE0640"
        );
    }

    #[test]
    fn required_param_missing_at_run_time() {
        let source = crate::test_helpers::stylesheet(
            r#"<xsl:template name="main"><xsl:param name="x" required="yes"/><xsl:value-of select="$x"/></xsl:template>"#,
        );
        assert_eq!(crate::test_helpers::run_error(&source).code(), "XTDE0700");
    }

    fn compiled_chain() -> Executable {
        crate::compiler::compile_stylesheet(&crate::test_helpers::stylesheet(
            r#"<xsl:template name="main"><xsl:call-template name="step"/><xsl:text>-</xsl:text><xsl:call-template name="step"/></xsl:template><xsl:template name="step"><xsl:text>a</xsl:text><xsl:call-template name="last"/></xsl:template><xsl:template name="last"><xsl:text>z</xsl:text></xsl:template>"#,
        ))
        .unwrap()
    }

    fn call_flags(body: &Instruction) -> Vec<bool> {
        match body {
            Instruction::Sequence(items) => items.iter().flat_map(call_flags).collect(),
            Instruction::CallTemplate(call) => vec![call.tail_call],
            _ => vec![],
        }
    }

    #[test]
    fn only_the_last_call_in_a_template_is_a_tail_call() {
        let executable = compiled_chain();
        let main = &executable.template("main").unwrap().body;
        assert_eq!(call_flags(main), vec![false, true]);
        let step = &executable.template("step").unwrap().body;
        assert_eq!(call_flags(step), vec![true]);
    }

    #[test]
    fn compiled_tail_calls_do_not_grow_the_depth() {
        let executable = compiled_chain();
        let mut scheduler = QueueScheduler::new();
        let output = Executor::new(&executable, &mut scheduler)
            .with_max_depth(2)
            .call_template("main", HashMap::new(), None)
            .unwrap();
        assert_eq!(output, "az-az");

        let err = Executor::new(&executable, &mut scheduler)
            .with_max_depth(1)
            .call_template("main", HashMap::new(), None)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::DepthExceeded(1)));
    }

    #[test]
    fn context_item_is_the_focus_of_main() {
        let source = crate::test_helpers::main_template(r#"<xsl:value-of select="upper-case(.)"/>"#);
        let (output, _) = crate::test_helpers::run_main(&source, Some("shout")).unwrap();
        assert_eq!(output, "SHOUT");
    }
}
