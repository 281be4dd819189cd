#[cfg(test)]
mod common;

#[cfg(test)]
mod auth_tests;


#[cfg(test)]
mod user_tests;

#[cfg(test)]
mod subject_meeting_tests;

#[cfg(test)]
mod task_tests;

#[cfg(test)]
mod communication_tests;

#[cfg(test)]
mod import_tests;

#[cfg(test)]
mod hearing_tests;

#[cfg(test)]
mod achievement_tests;

#[cfg(test)]
mod dashboard_tests;
