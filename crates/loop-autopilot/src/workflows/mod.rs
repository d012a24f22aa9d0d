pub mod interview_loop;
