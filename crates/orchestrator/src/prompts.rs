use crewflow_core::Stage;

/// Fixed task wording sent with every executor call for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePrompt {
    pub task_description: &'static str,
    pub expected_output: &'static str,
}

pub fn prompt_for(stage: Stage) -> StagePrompt {
    match stage {
        Stage::Research => StagePrompt {
            task_description: "Research and analyze the requested topics and questions",
            expected_output: "Detailed analysis with key findings and supporting evidence",
        },
        Stage::Analysis => StagePrompt {
            task_description: "Analyze the research findings to identify patterns, trends, \
                               and correlations, then derive key insights and actionable \
                               recommendations",
            expected_output: "Key insights and a list of recommendations with priorities",
        },
        Stage::Implementation => StagePrompt {
            task_description: "Design a detailed software architecture based on the \
                               requirements and implement its components",
            expected_output: "Architecture plan, component implementations and documentation",
        },
        Stage::Qa => StagePrompt {
            task_description: "Test the implementations at unit and integration level \
                               and assess code quality and security",
            expected_output: "Test results with coverage metrics, a quality report and \
                              recommendations",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stage_has_a_prompt() {
        for stage in Stage::ALL {
            let prompt = prompt_for(stage);
            assert!(!prompt.task_description.is_empty());
            assert!(!prompt.expected_output.is_empty());
        }
        assert!(prompt_for(Stage::Research)
            .expected_output
            .starts_with("Detailed analysis"));
    }
}
