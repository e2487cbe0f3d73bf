//! Attendance reporting over student chains.

use crate::core::{BlockHash, EntityId, Error, Result, Tier, Timestamp};
use crate::ledger::chain::Chain;
use crate::ledger::entity::{EntityState, Visibility};
use crate::ledger::registry::{MutationOutcome, Registry};
use crate::ledger::transaction::{AttendanceStatus, Transaction, TransactionKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One attendance block, flattened for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub index: u64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub timestamp: Timestamp,
    pub hash: BlockHash,
    pub previous_hash: BlockHash,
    pub nonce: u64,
}

/// A student's state and attendance marks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentAttendance {
    pub student: EntityState,
    pub attendance: Vec<AttendanceEntry>,
}

/// Attendance of every active student in one class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassAttendance {
    pub class: EntityState,
    pub students: Vec<StudentAttendance>,
}

/// A single mark in a bulk request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub student_id: EntityId,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
}

/// A mark from a bulk request that could not be recorded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RejectedMark {
    pub student_id: EntityId,
    pub error: String,
}

/// Outcome of a bulk attendance request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkAttendance {
    pub recorded: Vec<MutationOutcome>,
    pub rejected: Vec<RejectedMark>,
}

/// Attendance blocks of a chain, in chain order.
pub fn attendance_history(chain: &Chain) -> Vec<AttendanceEntry> {
    chain
        .history_of(TransactionKind::Attendance)
        .into_iter()
        .filter_map(|block| match &block.payload {
            Transaction::Attendance { status, date, .. } => Some(AttendanceEntry {
                index: block.index,
                date: *date,
                status: *status,
                timestamp: block.timestamp,
                hash: block.hash.clone(),
                previous_hash: block.previous_hash.clone(),
                nonce: block.nonce,
            }),
            _ => None,
        })
        .collect()
}

impl Registry {
    fn student_chain(&self, student_id: &EntityId) -> Result<&Chain> {
        self.chain(Tier::Student, student_id)
            .ok_or_else(|| Error::not_found(Tier::Student, student_id))
    }

    /// Record several marks; failures are collected, not fatal.
    pub fn record_bulk_attendance(&mut self, marks: Vec<AttendanceMark>) -> BulkAttendance {
        let mut recorded = Vec::new();
        let mut rejected = Vec::new();

        for mark in marks {
            match self.record_attendance(&mark.student_id, mark.status, mark.date) {
                Ok(outcome) => recorded.push(outcome),
                Err(err) => rejected.push(RejectedMark {
                    student_id: mark.student_id,
                    error: err.to_string(),
                }),
            }
        }

        tracing::info!(
            recorded = recorded.len(),
            rejected = rejected.len(),
            "bulk attendance recorded"
        );
        BulkAttendance { recorded, rejected }
    }

    /// Full attendance history of one student, deleted or not.
    pub fn student_attendance(&self, student_id: &EntityId) -> Result<StudentAttendance> {
        let chain = self.student_chain(student_id)?;
        Ok(StudentAttendance {
            student: chain.project_state(),
            attendance: attendance_history(chain),
        })
    }

    /// Attendance of the active students of a class, optionally for one date.
    pub fn class_attendance(
        &self,
        class_id: &EntityId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<StudentAttendance>> {
        if self.chain(Tier::Class, class_id).is_none() {
            return Err(Error::not_found(Tier::Class, class_id));
        }

        Ok(self
            .children_of(class_id)
            .iter()
            .filter_map(|id| self.chain(Tier::Student, id))
            .map(|chain| (chain.project_state(), chain))
            .filter(|(state, _)| !state.is_deleted())
            .map(|(student, chain)| StudentAttendance {
                student,
                attendance: attendance_history(chain)
                    .into_iter()
                    .filter(|entry| date.map_or(true, |d| entry.date == d))
                    .collect(),
            })
            .collect())
    }

    /// Class-by-class attendance of a department, optionally for one date.
    pub fn department_attendance(
        &self,
        department_id: &EntityId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<ClassAttendance>> {
        if self.chain(Tier::Department, department_id).is_none() {
            return Err(Error::not_found(Tier::Department, department_id));
        }

        self.children_of(department_id)
            .iter()
            .filter_map(|id| self.chain(Tier::Class, id))
            .map(|chain| -> Result<ClassAttendance> {
                Ok(ClassAttendance {
                    class: chain.project_state(),
                    students: self.class_attendance(chain.entity_id(), date)?,
                })
            })
            .collect()
    }

    /// Active students with at least one mark on `date`.
    pub fn attendance_on(&self, date: NaiveDate) -> Vec<StudentAttendance> {
        self.query_all(Tier::Student, Visibility::ActiveOnly)
            .into_iter()
            .filter_map(|student| {
                let chain = self.chain(Tier::Student, &student.entity_id)?;
                let attendance: Vec<_> = attendance_history(chain)
                    .into_iter()
                    .filter(|entry| entry.date == date)
                    .collect();
                (!attendance.is_empty()).then_some(StudentAttendance { student, attendance })
            })
            .collect()
    }

    /// [`attendance_on`](Self::attendance_on) for the current UTC date.
    pub fn attendance_today(&self) -> Vec<StudentAttendance> {
        self.attendance_on(crate::core::now().date_naive())
    }
}
