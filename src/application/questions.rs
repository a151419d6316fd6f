use futures::{future::try_join_all, try_join};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::context::ServiceContext;
use crate::application::error::{AppError, operation_failed};
use crate::application::repos::{FieldUpdate, FieldValue, WriteFields};
use crate::domain::entities::Question;

/// Change applied to an existing question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionEdit {
    /// Rewrite the question; marks it as updated.
    Text(String),
    /// Set or clear the owner's answer.
    Answer(Option<String>),
}

#[derive(Clone)]
pub struct QuestionService {
    ctx: ServiceContext,
}

impl QuestionService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Ask a question on the selected item.
    pub async fn add_question(&self, text: &str) -> Result<Question, AppError> {
        let user = self.ctx.require_user("ask a question")?;
        let selected = self.ctx.require_selected("ask a question")?;
        let text = required_text(text)?;

        // The owner id is read from the backend, not the local copy.
        let remote = self.ctx.fetch_item(&selected.id, "add_question").await?;

        let question_id = Uuid::new_v4().to_string();
        let mut fields = WriteFields::new();
        fields.insert("text".to_string(), FieldValue::from(text));
        fields.insert("answer".to_string(), FieldValue::from(Value::Null));
        fields.insert("userId".to_string(), FieldValue::from(user.id.clone()));
        fields.insert(
            "itemCreatorId".to_string(),
            FieldValue::from(remote.user_id.clone()),
        );
        fields.insert("updated".to_string(), FieldValue::from(false));
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);

        let collection = &self.ctx.collections.questions;
        let write_question = self.ctx.documents.set(collection, &question_id, fields);
        let link_question = self.ctx.documents.update(
            &self.ctx.collections.items,
            &selected.id,
            vec![FieldUpdate::array_union("questions", question_id.clone())],
        );
        let (stored, ()) =
            try_join!(write_question, link_question).map_err(operation_failed("add_question"))?;
        let question: Question = stored
            .decode(collection)
            .map_err(operation_failed("add_question"))?;

        self.ctx
            .state
            .questions()
            .upsert_one(question.id.clone(), question.clone());
        self.ctx.state.edit_item(&selected.id, |item| {
            if !item.questions.contains(&question_id) {
                item.questions.push(question_id.clone());
            }
        });

        info!(
            target = "bidhall::questions",
            item_id = %selected.id,
            question_id = %question.id,
            "question added"
        );
        Ok(question)
    }

    /// Fetch the questions of the selected item and merge them into the cache.
    ///
    /// Reloading is idempotent: merged ids overwrite, never duplicate.
    pub async fn load_item_questions(&self) -> Result<Vec<Question>, AppError> {
        let selected = self.ctx.require_selected("load questions")?;
        let remote = self.ctx.fetch_item(&selected.id, "load_questions").await?;
        let collection = &self.ctx.collections.questions;

        let documents = try_join_all(
            remote
                .questions
                .iter()
                .map(|question_id| self.ctx.documents.get(collection, question_id)),
        )
        .await
        .map_err(operation_failed("load_questions"))?;

        let mut questions = Vec::with_capacity(documents.len());
        for (question_id, document) in remote.questions.iter().zip(documents) {
            match document {
                Some(document) => questions.push(
                    document
                        .decode::<Question>(collection)
                        .map_err(operation_failed("load_questions"))?,
                ),
                None => warn!(
                    target = "bidhall::questions",
                    item_id = %selected.id,
                    question_id = %question_id,
                    "item references a missing question"
                ),
            }
        }

        self.ctx.state.questions().merge(
            questions
                .into_iter()
                .map(|question| (question.id.clone(), question)),
        );
        let ids = remote.questions.clone();
        self.ctx.state.edit_item(&selected.id, move |item| {
            item.questions = ids.clone();
        });

        Ok(self.item_questions(&selected.id))
    }

    /// Remove a question; allowed for the asker and the item owner.
    pub async fn delete_question(&self, question_id: &str) -> Result<(), AppError> {
        let user = self.ctx.require_user("delete a question")?;
        let selected = self.ctx.require_selected("delete a question")?;
        if !selected.questions.iter().any(|id| id == question_id) {
            return Err(AppError::not_found("question", question_id));
        }
        let question = match self.ctx.state.questions().get(question_id) {
            Some(question) => question,
            None => self.fetch_question(question_id, "delete_question").await?,
        };
        if question.user_id != user.id && question.item_creator_id != user.id {
            return Err(AppError::precondition(
                "only the asker or the item owner can delete this question",
            ));
        }

        let delete_document = self
            .ctx
            .documents
            .delete(&self.ctx.collections.questions, question_id);
        let unlink = self.ctx.documents.update(
            &self.ctx.collections.items,
            &selected.id,
            vec![FieldUpdate::array_remove("questions", question_id)],
        );
        try_join!(delete_document, unlink).map_err(operation_failed("delete_question"))?;

        self.ctx.state.questions().remove(question_id);
        self.ctx.state.edit_item(&selected.id, |item| {
            item.questions.retain(|id| id != question_id);
        });

        info!(
            target = "bidhall::questions",
            item_id = %selected.id,
            question_id,
            "question deleted"
        );
        Ok(())
    }

    /// Edit the text or answer of one cached question.
    pub async fn update_question(
        &self,
        question_id: &str,
        edit: QuestionEdit,
    ) -> Result<Question, AppError> {
        let user = self.ctx.require_user("edit a question")?;
        let mut question = self.ctx.state.questions().get(question_id).ok_or_else(|| {
            AppError::consistency(format!("question `{question_id}` is not cached"))
        })?;

        let updates = match &edit {
            QuestionEdit::Text(text) => {
                if question.user_id != user.id {
                    return Err(AppError::precondition("only the asker can edit a question"));
                }
                let text = required_text(text)?;
                question.text = text.to_string();
                question.updated = true;
                vec![
                    FieldUpdate::set("text", text),
                    FieldUpdate::set("updated", true),
                ]
            }
            QuestionEdit::Answer(answer) => {
                if question.item_creator_id != user.id {
                    return Err(AppError::precondition("only the item owner can answer"));
                }
                question.answer = answer.clone();
                vec![FieldUpdate::set(
                    "answer",
                    answer.clone().map_or(Value::Null, Value::String),
                )]
            }
        };

        self.ctx
            .documents
            .update(&self.ctx.collections.questions, question_id, updates)
            .await
            .map_err(operation_failed("update_question"))?;

        self.ctx
            .state
            .questions()
            .upsert_one(question.id.clone(), question.clone());

        info!(
            target = "bidhall::questions",
            question_id,
            answered = question.answer.is_some(),
            "question updated"
        );
        Ok(question)
    }

    async fn fetch_question(
        &self,
        question_id: &str,
        operation: &'static str,
    ) -> Result<Question, AppError> {
        let collection = &self.ctx.collections.questions;
        self.ctx
            .documents
            .get(collection, question_id)
            .await
            .map_err(operation_failed(operation))?
            .ok_or_else(|| AppError::not_found("question", question_id))?
            .decode(collection)
            .map_err(operation_failed(operation))
    }

    /// Cached questions of an item, newest first.
    pub fn item_questions(&self, item_id: &str) -> Vec<Question> {
        let item = self.ctx.state.items().get(item_id).or_else(|| {
            self.ctx
                .state
                .selected_item()
                .filter(|selected| selected.id == item_id)
        });
        let Some(item) = item else {
            return Vec::new();
        };
        let snapshot = self.ctx.state.questions().snapshot();
        item.questions
            .iter()
            .rev()
            .filter_map(|question_id| snapshot.get(question_id).cloned())
            .collect()
    }
}

fn required_text(text: &str) -> Result<&str, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(AppError::precondition("question text must not be empty"))
    } else {
        Ok(trimmed)
    }
}
