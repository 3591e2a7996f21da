//! Step and field layout of a wizard.

use serde::Serialize;

use crate::validation::FieldSpec;
use crate::wizard::state::StepNumber;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

/// Ordered steps of one wizard. `name` prefixes the analytics and catalog keys
/// (`franchise_modal`, `franchise_step_2`, `i18n.franchise.success.step2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowDefinition {
    name: String,
    steps: Vec<StepDefinition>,
}

impl FlowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, title: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        self.steps.push(StepDefinition {
            title: title.into(),
            fields,
        });
        self
    }

    /// The six-step franchise application.
    pub fn franchise() -> Self {
        use crate::validation::FieldSpec as F;

        Self::new("franchise")
            .step(
                "Dados Pessoais",
                vec![
                    F::required("full_name"),
                    F::required("email"),
                    F::required("phone"),
                    F::required("cpf"),
                    F::required("rg"),
                    F::required("birth_date"),
                    F::required("marital_status"),
                    F::optional("nationality"),
                    F::optional("address"),
                    F::optional("city"),
                    F::optional("state"),
                    F::optional("zipcode"),
                ],
            )
            .step(
                "Perfil Profissional",
                vec![
                    F::required("profession"),
                    F::optional("current_company"),
                    F::optional("current_position"),
                    F::required("experience_years"),
                    F::required("education_level"),
                    F::required("management_experience"),
                    F::required("sales_experience"),
                    F::required("marketing_experience"),
                ],
            )
            .step(
                "Investimento e Localização",
                vec![
                    F::required("investment_capacity"),
                    F::required("preferred_city"),
                    F::required("preferred_state"),
                    F::optional("preferred_region"),
                    F::required("expected_start_date"),
                    F::required("team_size"),
                    F::required("business_goals"),
                    F::required("why_franchise"),
                    F::required("available_time"),
                    F::required("risk_tolerance"),
                    F::optional("target_market"),
                    F::optional("expected_revenue"),
                    F::optional("references"),
                ],
            )
            .step("Documentação", vec![F::optional("documents")])
            .step(
                "Agendamento",
                vec![F::optional("meeting_date"), F::optional("meeting_notes")],
            )
            .step("Revisão e Confirmação", vec![F::required("accept_terms")])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_steps(&self) -> u8 {
        u8::try_from(self.steps.len()).unwrap_or(u8::MAX)
    }

    pub fn definition(&self, step: StepNumber) -> Option<&StepDefinition> {
        self.steps.get(usize::from(step.get()) - 1)
    }

    /// Fields of `step`; empty for a step outside the flow.
    pub fn fields(&self, step: StepNumber) -> &[FieldSpec] {
        self.definition(step)
            .map(|d| d.fields.as_slice())
            .unwrap_or(&[])
    }

    /// The step a field belongs to, with its declaration.
    pub fn field(&self, name: &str) -> Option<(StepNumber, &FieldSpec)> {
        let total = self.total_steps();
        self.steps.iter().enumerate().find_map(|(i, def)| {
            let step = StepNumber::new(u8::try_from(i + 1).ok()?, total)?;
            def.fields
                .iter()
                .find(|f| f.name == name)
                .map(|field| (step, field))
        })
    }

    pub fn modal_name(&self) -> String {
        format!("{}_modal", self.name)
    }

    pub fn step_name(&self, step: StepNumber) -> String {
        format!("{}_step_{}", self.name, step)
    }

    pub fn step_notice_key(&self, step: StepNumber) -> String {
        format!("i18n.{}.success.step{}", self.name, step)
    }

    pub fn completion_title_key(&self) -> String {
        format!("i18n.{}.success.complete", self.name)
    }

    /// The numbered message takes an `{application_number}` param.
    pub fn completion_message_key(&self, numbered: bool) -> String {
        if numbered {
            format!("i18n.{}.success.complete_message", self.name)
        } else {
            format!("i18n.{}.success.received", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldKind;

    #[test]
    fn test_franchise_layout() {
        let flow = FlowDefinition::franchise();
        assert_eq!(flow.total_steps(), 6);

        let step1 = StepNumber::new(1, 6).unwrap();
        let required: Vec<_> = flow
            .fields(step1)
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            required,
            vec!["full_name", "email", "phone", "cpf", "rg", "birth_date", "marital_status"]
        );

        let step4 = StepNumber::new(4, 6).unwrap();
        assert!(flow.fields(step4).iter().all(|f| !f.required));
    }

    #[test]
    fn test_field_lookup() {
        let flow = FlowDefinition::franchise();
        let (step, field) = flow.field("zipcode").unwrap();
        assert_eq!(step.get(), 1);
        assert_eq!(field.kind, FieldKind::Zipcode);
        assert!(!field.required);

        let (step, _) = flow.field("why_franchise").unwrap();
        assert_eq!(step.get(), 3);
        assert!(flow.field("nope").is_none());
    }

    #[test]
    fn test_names() {
        let flow = FlowDefinition::franchise();
        let step = StepNumber::new(2, 6).unwrap();
        assert_eq!(flow.modal_name(), "franchise_modal");
        assert_eq!(flow.step_name(step), "franchise_step_2");
        assert_eq!(flow.step_notice_key(step), "i18n.franchise.success.step2");
        assert_eq!(flow.completion_title_key(), "i18n.franchise.success.complete");
        assert_eq!(
            flow.completion_message_key(false),
            "i18n.franchise.success.received"
        );
    }
}
